//! CLI entry point. Grounded in `original_source/Common/pr3287/pr3287.c`'s
//! `main`: parse options, resolve signals, run the supervisor loop until
//! exit, map the outcome to a process exit code.

use pr3270::config::Options;
use pr3270::lu::LuSelector;
#[cfg(not(windows))]
use pr3270::printer::ProcessSink;
#[cfg(windows)]
use pr3270::printer::SpoolSink;
use pr3270::supervisor::ConnectionSupervisor;
use pr3270::trace;

fn main() {
    trace::init();

    std::panic::set_hook(Box::new(|info| {
        trace::error_once(format!("panic: {info}"));
    }));

    ignore_sigpipe();
    pr3270::signal::install();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let opts = match Options::from_args(&args) {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("Use -help for the list of options");
            std::process::exit(1);
        }
    };
    trace::options(&opts);

    let lu_factory = {
        let opts = opts.clone();
        move || -> LuSelector {
            match &opts.assoc {
                Some(assoc) => LuSelector::associate(assoc.clone()),
                None => LuSelector::connect(opts.lus.clone()),
            }
        }
    };

    let trnpre = opts.trnpre.as_ref().and_then(|p| std::fs::read(p).ok());
    let trnpost = opts.trnpost.as_ref().and_then(|p| std::fs::read(p).ok());

    #[cfg(not(windows))]
    let mut sink = {
        let command = opts
            .printer
            .clone()
            .or_else(|| std::env::var("PRINTER").ok())
            .unwrap_or_else(|| "lpr".to_string());
        ProcessSink::new(command).with_transparent_files(trnpre, trnpost)
    };
    #[cfg(windows)]
    let mut sink = SpoolSink::new(opts.printer.clone()).with_transparent_files(trnpre, trnpost);

    let mut supervisor = ConnectionSupervisor::new(opts.host.clone(), opts.port, "IBM-3287-1");
    if let Some(port) = opts.syncport {
        match std::net::TcpStream::connect(("127.0.0.1", port)) {
            Ok(sock) => supervisor = supervisor.with_sync_socket(sock),
            Err(e) => trace::error_once(format!("could not connect sync socket: {e}")),
        }
    }

    match supervisor.run(lu_factory, &opts, &mut sink) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            trace::error_once(format!("{e}"));
            std::process::exit(1);
        }
    }
}

#[cfg(unix)]
fn ignore_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }
}

#[cfg(not(unix))]
fn ignore_sigpipe() {}

#[cfg(test)]
mod tests {
    #[test]
    fn builds() {
        assert!(true);
    }
}
