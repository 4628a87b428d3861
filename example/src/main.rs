use tracing::trace_span;
use tracing_subscriber::{
    EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use firebro::Result;

mod connection;
mod query;
mod blob;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::Registry::default()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    trace_span!("connection").in_scope(connection::main)?;
    trace_span!("query").in_scope(query::main)?;
    trace_span!("blob").in_scope(blob::main)?;

    Ok(())
}
