mod cmdline;
mod error;
mod pinmap_cli;
mod registry;

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};

use structopt::StructOpt;

use pinflash::backend::{Backend, Dummy, RemoteTcp, Serial};
#[cfg(target_os = "linux")]
use pinflash::backend::LocalGpio;
use pinflash::driver::Context;
use pinflash::file_format::{FileFormat, Hexdump, IntelHex32};
use pinflash::mem::Mem;
use pinflash::pinmap::{parse_numeric_pinmap, PinMap};
use pinflash::pinproxy::PinProxy;
use pinflash::progress::TerminalProgress;

use cmdline::{Command, Common};
use error::{CliError, Result};

fn main() {
    env_logger::init();
    if let Err(e) = run(Command::from_args()) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Read { common, format, path } => {
            let fmt = file_format(&format)?;
            let mem = do_read(&common)?;
            let mut out = BufWriter::new(File::create(&path)?);
            for line in fmt.encode(&mem) {
                out.write_all(line.as_bytes())?;
            }
            Ok(())
        }
        Command::Write { common, format, path } => {
            let fmt = file_format(&format)?;
            let mut input = BufReader::new(File::open(&path)?);
            let mem = fmt.decode(&mut input)?;
            do_write(&common, &mem)
        }
        Command::Erase { common } => do_erase(&common),
    }
}

fn file_format(name: &str) -> Result<Box<dyn FileFormat>> {
    match name {
        "hexdump" => Ok(Box::new(Hexdump)),
        "ihex32" => Ok(Box::new(IntelHex32)),
        other => Err(CliError::UnknownFormat(other.to_string())),
    }
}

/// Opens the named backend, builds a pin-proxy scoped around `f`, and runs
/// it with a stderr progress sink. The backend is always closed on the way
/// out, including when `f` itself fails.
fn with_backend<B, T, F>(backend: B, pinmap: PinMap<B::Pin>, f: F) -> Result<T>
where
    B: Backend,
    F: FnOnce(&mut Context<'_, B>) -> Result<T>,
{
    let pinproxy = PinProxy::new(backend, pinmap)?;
    pinproxy.scoped(|p| {
        let mut progress = TerminalProgress::stderr();
        let mut ctx = Context::new(p, &mut progress);
        Ok(f(&mut ctx))
    })?
}

fn do_read(common: &Common) -> Result<Mem> {
    match common.backend.as_str() {
        "dummy" => with_backend(Dummy::new(), parse_numeric_pinmap(&common.pin), |ctx| {
            registry::read(&common.driver, ctx, common.model)
        }),
        "local" => run_local(common, |ctx| registry::read(&common.driver, ctx, common.model)),
        "serial" => with_backend(serial_backend(common)?, pinmap_cli::parse_static_pinmap(&common.pin), |ctx| {
            registry::read(&common.driver, ctx, common.model)
        }),
        "remote" => with_backend(remote_backend(common)?, parse_numeric_pinmap(&common.pin), |ctx| {
            registry::read(&common.driver, ctx, common.model)
        }),
        other => Err(CliError::UnknownBackend(other.to_string())),
    }
}

fn do_write(common: &Common, mem: &Mem) -> Result<()> {
    match common.backend.as_str() {
        "dummy" => with_backend(Dummy::new(), parse_numeric_pinmap(&common.pin), |ctx| {
            registry::write(&common.driver, ctx, common.model, mem)
        }),
        "local" => run_local(common, |ctx| registry::write(&common.driver, ctx, common.model, mem)),
        "serial" => with_backend(serial_backend(common)?, pinmap_cli::parse_static_pinmap(&common.pin), |ctx| {
            registry::write(&common.driver, ctx, common.model, mem)
        }),
        "remote" => with_backend(remote_backend(common)?, parse_numeric_pinmap(&common.pin), |ctx| {
            registry::write(&common.driver, ctx, common.model, mem)
        }),
        other => Err(CliError::UnknownBackend(other.to_string())),
    }
}

fn do_erase(common: &Common) -> Result<()> {
    match common.backend.as_str() {
        "dummy" => with_backend(Dummy::new(), parse_numeric_pinmap(&common.pin), |ctx| {
            registry::erase(&common.driver, ctx, common.model)
        }),
        "local" => run_local(common, |ctx| registry::erase(&common.driver, ctx, common.model)),
        "serial" => with_backend(serial_backend(common)?, pinmap_cli::parse_static_pinmap(&common.pin), |ctx| {
            registry::erase(&common.driver, ctx, common.model)
        }),
        "remote" => with_backend(remote_backend(common)?, parse_numeric_pinmap(&common.pin), |ctx| {
            registry::erase(&common.driver, ctx, common.model)
        }),
        other => Err(CliError::UnknownBackend(other.to_string())),
    }
}

fn serial_backend(common: &Common) -> Result<Serial> {
    let path = common
        .serial_path
        .clone()
        .ok_or_else(|| CliError::UnknownBackend("serial (missing --serial-path)".into()))?;
    Ok(Serial::new(path, common.serial_baud))
}

fn remote_backend(common: &Common) -> Result<RemoteTcp> {
    let host = common
        .remote_host
        .clone()
        .ok_or_else(|| CliError::UnknownBackend("remote (missing --remote-host)".into()))?;
    Ok(RemoteTcp::new(host, common.remote_port))
}

#[cfg(target_os = "linux")]
fn run_local<T>(
    common: &Common,
    f: impl FnOnce(&mut Context<'_, LocalGpio>) -> Result<T>,
) -> Result<T> {
    with_backend(LocalGpio::new(), parse_numeric_pinmap(&common.pin), f)
}

#[cfg(not(target_os = "linux"))]
fn run_local<T>(
    _common: &Common,
    _f: impl FnOnce(&mut Context<'_, Dummy>) -> Result<T>,
) -> Result<T> {
    Err(CliError::UnknownBackend("local (only available on linux)".into()))
}
