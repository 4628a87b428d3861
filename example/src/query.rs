use firebro::{Attachment, IsolationLevel, Result, StatementKind, TransactionOptions, types::Value};
use time::PrimitiveDateTime;

pub fn main() -> Result<()> {
    let attachment = Attachment::connect_env()?;
    let tx = attachment.begin_transaction(&TransactionOptions::default())?;

    // Execute

    let mut stmt = attachment.create_statement();
    stmt.prepare(&tx, "RECREATE TABLE firebro(id INTEGER, name VARCHAR(40))")?;
    stmt.execute(&[])?;
    tx.commit_retaining()?;

    stmt.prepare(&tx, "INSERT INTO firebro(id, name) VALUES(?, ?)")?;
    assert_eq!(stmt.kind(), StatementKind::Insert);
    for (id, name) in [(1, "Deez"), (2, "Foo")] {
        stmt.execute(&[Value::Integer(id), Value::Text(name.into())])?;
        assert_eq!(stmt.records_affected(), 1);
    }

    // Queries

    stmt.prepare(&tx, "SELECT id, name FROM firebro ORDER BY id")?;
    stmt.set_fetch_size(1);
    stmt.execute(&[])?;

    let mut datas = vec![];
    while let Some(row) = stmt.fetch()? {
        datas.push(row.decode::<(i32, String)>()?);
    }
    assert_eq!(datas.len(), 2);
    assert_eq!(datas[0].1.as_str(), "Deez");

    tracing::info!(plan = stmt.execution_plan()?, "plan");

    stmt.prepare(&tx, "SELECT CURRENT_TIMESTAMP FROM RDB$DATABASE")?;
    stmt.execute(&[])?;
    let row = stmt.fetch()?.unwrap();
    let (_now,) = row.decode::<(PrimitiveDateTime,)>()?;

    tx.commit()?;

    // Read only snapshot

    let options = TransactionOptions::new().isolation(IsolationLevel::Concurrency).read_only();
    let tx = attachment.begin_transaction(&options)?;
    let mut stmt = attachment.create_statement();
    stmt.prepare(&tx, "SELECT name FROM firebro WHERE id = ?")?;
    stmt.execute(&[Value::Integer(2)])?;
    let name = stmt.fetch()?.unwrap().try_get::<_, String>("NAME")?;
    assert_eq!(name, "Foo");

    // Error case

    stmt.prepare(&tx, "SELECT foo FROM nowhere").unwrap_err();
    stmt.prepare(&tx, "INSERT INTO firebro(id) VALUES(3)")?;
    stmt.execute(&[]).unwrap_err();

    tx.rollback()?;
    attachment.detach()?;

    Ok(())
}
