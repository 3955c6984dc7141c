mod error;
mod server;

use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "pinflash-gpiod")]
struct Opt {
    /// Address to bind.
    #[structopt(short = "b", long, default_value = "0.0.0.0")]
    bind: String,

    /// Port to listen on.
    #[structopt(short = "p", long, default_value = "30456")]
    port: u16,
}

fn main() {
    env_logger::init();
    let opt = Opt::from_args();
    if let Err(e) = server::serve_forever(&opt.bind, opt.port) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
