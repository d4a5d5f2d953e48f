//! `ConnectionSupervisor` (§4.7): the outer reconnect loop. Grounded in
//! `src/network.rs`'s `OwnedTlsStream`/`StreamType` plain-vs-TLS split and
//! its `configure_tcp_keepalive`/`build_tls_connector` helpers, stripped of
//! the GUI session's background receive thread and protocol autodetection
//! (this core runs single-threaded, blocking, one host at a time).

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use rustls::pki_types::ServerName as TlsServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore};

use crate::config::{AddressFamily, Options};
use crate::error::{FatalError, Tn3270Error, TlsError};
use crate::lu::LuSelector;
use crate::printer::PrinterSink;
use crate::scs::ScsInterpreter;
use crate::telnet::{DataType, TelnetFsm};
use crate::tn3270::ds::{DsInterpreter, DsOptions};

enum Stream {
    Plain(TcpStream),
    Tls(Box<OwnedTlsStream>),
}

struct OwnedTlsStream {
    conn: ClientConnection,
    sock: TcpStream,
}

impl Read for OwnedTlsStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        rustls::Stream::new(&mut self.conn, &mut self.sock).read(buf)
    }
}

impl Write for OwnedTlsStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        rustls::Stream::new(&mut self.conn, &mut self.sock).write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        rustls::Stream::new(&mut self.conn, &mut self.sock).flush()
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Stream::Plain(s) => s.read(buf),
            Stream::Tls(s) => s.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Stream::Plain(s) => s.write(buf),
            Stream::Tls(s) => s.write(buf),
        }
    }
    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Stream::Plain(s) => s.flush(),
            Stream::Tls(s) => s.flush(),
        }
    }
}

impl Stream {
    fn set_read_timeout(&self, dur: Option<Duration>) -> std::io::Result<()> {
        match self {
            Stream::Plain(s) => s.set_read_timeout(dur),
            Stream::Tls(s) => s.sock.set_read_timeout(dur),
        }
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct ConnectionSupervisor {
    host: String,
    port: u16,
    termtype: String,
    sync_socket: Option<TcpStream>,
}

impl ConnectionSupervisor {
    pub fn new(host: impl Into<String>, port: u16, termtype: impl Into<String>) -> Self {
        ConnectionSupervisor { host: host.into(), port, termtype: termtype.into(), sync_socket: None }
    }

    pub fn with_sync_socket(mut self, sock: TcpStream) -> Self {
        sock.set_nonblocking(true).ok();
        self.sync_socket = Some(sock);
        self
    }

    /// Run the outer loop: connect, negotiate, pump records until EOF or
    /// error, flush, then either retry (per `opts.reconnect`) or return.
    pub fn run(
        &mut self,
        lu_factory: impl Fn() -> LuSelector,
        opts: &Options,
        sink: &mut dyn PrinterSink,
    ) -> Result<(), Tn3270Error> {
        loop {
            match self.run_once(lu_factory(), opts, sink) {
                Ok(()) => return Ok(()),
                Err(Tn3270Error::Fatal(e)) => return Err(Tn3270Error::Fatal(e)),
                Err(e) => {
                    crate::trace::error_once(format!("session ended: {e}"));
                    if !opts.reconnect {
                        return Err(e);
                    }
                    std::thread::sleep(Duration::from_secs(1));
                }
            }
        }
    }

    fn connect(&self, opts: &Options) -> Result<Stream, Tn3270Error> {
        let addrs: Vec<_> = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(Tn3270Error::from)?
            .filter(|a| match opts.address_family {
                AddressFamily::Any => true,
                AddressFamily::V4Only => a.is_ipv4(),
                AddressFamily::V6Only => a.is_ipv6(),
            })
            .collect();
        let mut last_err = None;
        for addr in &addrs {
            match TcpStream::connect_timeout(addr, Duration::from_secs(15)) {
                Ok(tcp) => {
                    configure_keepalive(&tcp);
                    tcp.set_read_timeout(Some(Duration::from_secs(15))).ok();
                    if opts.tls {
                        return self.wrap_tls(tcp).map(Stream::Tls).map(|s| s);
                    }
                    return Ok(Stream::Plain(tcp));
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(Tn3270Error::from(last_err.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved")
        })))
    }

    fn wrap_tls(&self, tcp: TcpStream) -> Result<Box<OwnedTlsStream>, Tn3270Error> {
        let mut roots = RootCertStore::empty();
        for cert in rustls_native_certs::load_native_certs().map_err(|e| {
            Tn3270Error::Tls(TlsError::HandshakeFailed { message: e.to_string() })
        })? {
            roots.add(cert).map_err(|e| Tn3270Error::Tls(TlsError::HandshakeFailed { message: e.to_string() }))?;
        }
        let config = ClientConfig::builder().with_root_certificates(roots).with_no_client_auth();
        let name = TlsServerName::try_from(self.host.clone())
            .map_err(|e| Tn3270Error::Tls(TlsError::HandshakeFailed { message: e.to_string() }))?;
        let conn = ClientConnection::new(std::sync::Arc::new(config), name)
            .map_err(|e| Tn3270Error::Tls(TlsError::HandshakeFailed { message: e.to_string() }))?;
        Ok(Box::new(OwnedTlsStream { conn, sock: tcp }))
    }

    fn run_once(&mut self, lu: LuSelector, opts: &Options, sink: &mut dyn PrinterSink) -> Result<(), Tn3270Error> {
        let mut stream = self.connect(opts)?;
        let mut fsm = TelnetFsm::new(self.termtype.clone(), lu, opts.tls);
        let mut ds = DsInterpreter::new(24, 80);
        if let Some(path) = &opts.xtable {
            match std::fs::read_to_string(path) {
                Ok(contents) => ds.xtable = Some(crate::charset::XTable::parse(&contents)),
                Err(e) => crate::trace::error_once(format!("could not read xtable {path}: {e}")),
            }
        }
        let mut scs = ScsInterpreter::new(false);
        let ds_opts = DsOptions { render: opts.render_options(), emflush: opts.emflush };
        let scs_opts = opts.scs_options();

        let mut buf = [0u8; 4096];
        let mut last_traffic = Instant::now();
        stream.set_read_timeout(Some(POLL_INTERVAL)).ok();

        loop {
            if crate::signal::shutdown_requested() {
                flush_all(&mut ds, &mut scs, sink, &ds_opts, scs_opts)?;
                return Ok(());
            }
            if let Some(sync) = &mut self.sync_socket {
                let mut probe = [0u8; 1];
                match sync.read(&mut probe) {
                    Ok(0) => return Ok(()),
                    Ok(_) => return Ok(()),
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                    Err(e) => return Err(Tn3270Error::from(e)),
                }
            }

            match stream.read(&mut buf) {
                Ok(0) => {
                    flush_all(&mut ds, &mut scs, sink, &ds_opts, scs_opts)?;
                    return Ok(());
                }
                Ok(n) => {
                    last_traffic = Instant::now();
                    let records = fsm.feed(&buf[..n], &mut stream)?;
                    for rec in records {
                        self.handle_record(&rec, &mut fsm, &mut ds, &mut scs, sink, &ds_opts, scs_opts, &mut stream)?;
                    }
                    if fsm.starttls_pending {
                        let tcp = match stream {
                            Stream::Plain(s) => s,
                            Stream::Tls(_) => return Err(Tn3270Error::Fatal(FatalError::InvalidOption {
                                option: "starttls".into(),
                                reason: "already TLS".into(),
                            })),
                        };
                        stream = Stream::Tls(self.wrap_tls(tcp)?);
                        fsm.resume_after_tls();
                        stream.set_read_timeout(Some(POLL_INTERVAL)).ok();
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {
                    if !opts.ignoreeoj && last_traffic.elapsed() >= opts.eojtimeout {
                        flush_all(&mut ds, &mut scs, sink, &ds_opts, scs_opts)?;
                        last_traffic = Instant::now();
                    }
                }
                Err(e) => return Err(Tn3270Error::from(e)),
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_record(
        &self,
        rec: &crate::telnet::Record,
        fsm: &mut TelnetFsm,
        ds: &mut DsInterpreter,
        scs: &mut ScsInterpreter,
        sink: &mut dyn PrinterSink,
        ds_opts: &DsOptions,
        scs_opts: crate::scs::ScsOptions,
        stream: &mut Stream,
    ) -> Result<(), Tn3270Error> {
        use crate::error::DsStatus;
        match rec.data_type {
            Some(DataType::Unbind) => {
                scs.flush_pending(sink, scs_opts)?;
                scs.reset_on_unbind();
            }
            Some(DataType::ScsData) | None if is_scs_payload(rec) => {
                scs.process(&rec.payload, sink, ds.charset, ds.xtable.as_ref(), scs_opts)?;
            }
            _ => {
                let status = ds.process(&rec.payload, sink, ds_opts)?;
                if let Some(reply) = ds.take_pending_reply() {
                    let framed = fsm.send_record(&reply, DataType::Tn3270Data, 0);
                    stream.write_all(&framed).map_err(Tn3270Error::from)?;
                }
                if let Some(seq) = rec.seq {
                    if rec.wants_response() && fsm.responses_negotiated() {
                        let resp = match status {
                            DsStatus::BadCmd | DsStatus::BadAddr | DsStatus::Failed => {
                                fsm.respond_negative(seq, crate::telnet::NEG_COMMAND_REJECT)
                            }
                            DsStatus::OkayOutput | DsStatus::OkayNoOutput => fsm.respond_positive(seq),
                        };
                        stream.write_all(&resp).map_err(Tn3270Error::from)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn is_scs_payload(rec: &crate::telnet::Record) -> bool {
    matches!(rec.data_type, Some(DataType::ScsData)) || rec.data_type.is_none()
}

fn flush_all(
    ds: &mut DsInterpreter,
    scs: &mut ScsInterpreter,
    sink: &mut dyn PrinterSink,
    ds_opts: &DsOptions,
    scs_opts: crate::scs::ScsOptions,
) -> Result<(), Tn3270Error> {
    ds.flush_job(sink, ds_opts)?;
    scs.flush_pending(sink, scs_opts)?;
    Ok(())
}

fn configure_keepalive(tcp: &TcpStream) {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        let fd = tcp.as_raw_fd();
        unsafe {
            let optval: libc::c_int = 1;
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_KEEPALIVE,
                &optval as *const _ as *const libc::c_void,
                std::mem::size_of_val(&optval) as libc::socklen_t,
            );
        }
    }
    let _ = tcp;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supervisor_stores_host_and_port() {
        let sup = ConnectionSupervisor::new("example.com", 23, "IBM-3287-1");
        assert_eq!(sup.host, "example.com");
        assert_eq!(sup.port, 23);
    }
}
