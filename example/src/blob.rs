use firebro::{Attachment, Blob, Result, types::Value};

pub fn main() -> Result<()> {
    let attachment = Attachment::connect_env()?;
    let tx = attachment.begin_transaction(&Default::default())?;

    let mut stmt = attachment.create_statement();
    stmt.prepare(&tx, "RECREATE TABLE firebro_memo(id INTEGER, memo BLOB SUB_TYPE TEXT)")?;
    stmt.execute(&[])?;
    tx.commit_retaining()?;

    // text parameter is written as a blob
    stmt.prepare(&tx, "INSERT INTO firebro_memo(id, memo) VALUES(?, ?)")?;
    stmt.execute(&[Value::Integer(1), Value::Text("long text ".repeat(1000))])?;

    let mut blob = Blob::new(&tx);
    blob.set_segment_size(1024);
    blob.write_str("written by segments")?;
    stmt.execute(&[Value::Integer(2), Value::Blob(blob.id())])?;

    stmt.prepare(&tx, "SELECT memo FROM firebro_memo ORDER BY id")?;
    stmt.execute(&[])?;
    while let Some(row) = stmt.fetch()? {
        let memo = row.column(0)?.read_blob(&tx)?;
        tracing::info!(?memo, "memo");
    }

    tx.commit()?;
    attachment.detach()?;
    Ok(())
}
