use byteswarm::config::{self, PooledArgs};
use byteswarm::server::pooled::PooledServer;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    byteswarm::init_tracing();
    let args = config::parse_or_default::<PooledArgs>();

    let server = PooledServer::bind(args.port, args.threads)?;
    server.run()?;
    Ok(())
}
