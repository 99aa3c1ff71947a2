use byteswarm::config::{self, ServerArgs};
use byteswarm::server::polled::PolledServer;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    byteswarm::init_tracing();
    let args = config::parse_or_default::<ServerArgs>();

    let server = PolledServer::bind(args.port)?;
    server.run()?;
    Ok(())
}
