use byteswarm::client;
use byteswarm::config::{self, LoadgenArgs};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    byteswarm::init_tracing();
    let args = config::parse_or_default::<LoadgenArgs>();

    client::run(args)?;
    Ok(())
}
