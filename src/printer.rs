//! `PrinterSink` (§4.6): a buffered byte sink over a spawned print
//! command (POSIX) or the Windows spooler, sharing one trait the way
//! `platform.rs`'s `FileSystem`/`System`/`Networking` traits split a
//! single contract across POSIX/Windows implementations.

use std::io::{self, Write};
use std::process::{Child, ChildStdin, Command, Stdio};

/// Byte-level sink with lazy job start and transparent prefix/suffix
/// framing, per §4.6.
pub trait PrinterSink {
    fn write(&mut self, byte: u8) -> io::Result<()>;
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
    /// Emits the optional `trnpost` suffix and closes the job.
    fn end_of_job(&mut self) -> io::Result<()>;
}

fn broken_pipe(reason: &str) -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, reason.to_string())
}

/// POSIX sink: a `popen`-style spawn of the configured print command,
/// with SIGINT ignored in the child so an operator Ctrl-C at the
/// terminal doesn't kill an in-flight print job (mirrors
/// `popen_no_sigint`/`pclose_no_sigint` in the design notes).
pub struct ProcessSink {
    command: String,
    trnpre: Option<Vec<u8>>,
    trnpost: Option<Vec<u8>>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    sink_broken: bool,
}

impl ProcessSink {
    pub fn new(command: impl Into<String>) -> Self {
        ProcessSink {
            command: command.into(),
            trnpre: None,
            trnpost: None,
            child: None,
            stdin: None,
            sink_broken: false,
        }
    }

    pub fn with_transparent_files(mut self, trnpre: Option<Vec<u8>>, trnpost: Option<Vec<u8>>) -> Self {
        self.trnpre = trnpre;
        self.trnpost = trnpost;
        self
    }

    fn ensure_open(&mut self) -> io::Result<()> {
        if self.sink_broken {
            return Err(broken_pipe("sink latched broken"));
        }
        if self.child.is_some() {
            return Ok(());
        }
        #[allow(unused_mut)]
        let mut cmd_builder = {
            #[cfg(unix)]
            {
                let mut c = Command::new("/bin/sh");
                c.arg("-c").arg(&self.command);
                c.stdin(Stdio::piped());
                ignore_sigint(&mut c);
                c
            }
            #[cfg(not(unix))]
            {
                let mut c = Command::new("cmd");
                c.arg("/C").arg(&self.command);
                c.stdin(Stdio::piped());
                c
            }
        };
        let mut child = cmd_builder.spawn()?;
        let mut stdin = child.stdin.take().ok_or_else(|| broken_pipe("no stdin"))?;
        if let Some(prefix) = self.trnpre.take() {
            stdin.write_all(&prefix)?;
        }
        self.child = Some(child);
        self.stdin = Some(stdin);
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.ensure_open()?;
        let result = self.stdin.as_mut().expect("opened above").write_all(bytes);
        if result.is_err() {
            self.sink_broken = true;
        }
        result
    }
}

#[cfg(unix)]
fn ignore_sigint(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    unsafe {
        cmd.pre_exec(|| {
            libc::signal(libc::SIGINT, libc::SIG_IGN);
            Ok(())
        });
    }
}

impl PrinterSink for ProcessSink {
    fn write(&mut self, byte: u8) -> io::Result<()> {
        self.write_all(&[byte])
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.sink_broken {
            return Err(broken_pipe("sink latched broken"));
        }
        if let Some(stdin) = self.stdin.as_mut() {
            stdin.flush()?;
        }
        Ok(())
    }

    fn end_of_job(&mut self) -> io::Result<()> {
        if let Some(suffix) = self.trnpost.take() {
            self.write_all(&suffix)?;
        }
        self.flush()?;
        self.stdin.take();
        if let Some(mut child) = self.child.take() {
            let status = child.wait()?;
            if !status.success() {
                return Err(io::Error::other(format!(
                    "print command exited with status {:?}",
                    status.code()
                )));
            }
        }
        Ok(())
    }
}

/// Windows sink: buffers the job to a temporary file and hands it to the
/// shell's print verb (or the printer named by `-printer`/`PRINTER`) at
/// end-of-job, matching the `ws_*` spooler helpers' design.
#[cfg(windows)]
pub struct SpoolSink {
    printer: Option<String>,
    trnpre: Option<Vec<u8>>,
    trnpost: Option<Vec<u8>>,
    buffer: Vec<u8>,
    opened: bool,
    sink_broken: bool,
}

#[cfg(windows)]
impl SpoolSink {
    pub fn new(printer: Option<String>) -> Self {
        SpoolSink {
            printer,
            trnpre: None,
            trnpost: None,
            buffer: Vec::new(),
            opened: false,
            sink_broken: false,
        }
    }

    pub fn with_transparent_files(mut self, trnpre: Option<Vec<u8>>, trnpost: Option<Vec<u8>>) -> Self {
        self.trnpre = trnpre;
        self.trnpost = trnpost;
        self
    }

    fn ensure_open(&mut self) {
        if !self.opened {
            if let Some(prefix) = self.trnpre.take() {
                self.buffer.extend_from_slice(&prefix);
            }
            self.opened = true;
        }
    }
}

#[cfg(windows)]
impl PrinterSink for SpoolSink {
    fn write(&mut self, byte: u8) -> io::Result<()> {
        if self.sink_broken {
            return Err(broken_pipe("sink latched broken"));
        }
        self.ensure_open();
        self.buffer.push(byte);
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.sink_broken {
            return Err(broken_pipe("sink latched broken"));
        }
        self.ensure_open();
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn end_of_job(&mut self) -> io::Result<()> {
        if let Some(suffix) = self.trnpost.take() {
            self.buffer.extend_from_slice(&suffix);
        }
        let printer = self
            .printer
            .clone()
            .or_else(|| std::env::var("PRINTER").ok())
            .unwrap_or_else(|| "default".to_string());
        let mut tmp = std::env::temp_dir();
        tmp.push(format!("pr3270-{}.tmp", std::process::id()));
        std::fs::write(&tmp, &self.buffer)?;
        let status = Command::new("cmd")
            .args(["/C", "print", "/D:", &printer, tmp.to_str().unwrap_or_default()])
            .status()?;
        let _ = std::fs::remove_file(&tmp);
        self.buffer.clear();
        self.opened = false;
        if !status.success() {
            self.sink_broken = true;
            return Err(io::Error::other("spool submission failed"));
        }
        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// In-memory sink used by interpreter unit tests.
    #[derive(Default)]
    pub struct MemSink {
        pub data: Vec<u8>,
        pub ended: bool,
    }

    impl PrinterSink for MemSink {
        fn write(&mut self, byte: u8) -> io::Result<()> {
            self.data.push(byte);
            Ok(())
        }

        fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.data.extend_from_slice(bytes);
            Ok(())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn end_of_job(&mut self) -> io::Result<()> {
            self.ended = true;
            Ok(())
        }
    }

    #[test]
    fn mem_sink_records_bytes() {
        let mut sink = MemSink::default();
        sink.write(b'A').unwrap();
        sink.write_bytes(b"BC").unwrap();
        sink.end_of_job().unwrap();
        assert_eq!(sink.data, b"ABC");
        assert!(sink.ended);
    }
}
