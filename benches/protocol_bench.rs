use criterion::{black_box, criterion_group, criterion_main, Criterion};

use pr3270::charset::CharSet;
use pr3270::printer::PrinterSink;
use pr3270::scs::{ScsInterpreter, ScsOptions};
use pr3270::tn3270::ds::{DsInterpreter, DsOptions};

#[derive(Default)]
struct SinkBuf(Vec<u8>);

impl PrinterSink for SinkBuf {
    fn write(&mut self, byte: u8) -> std::io::Result<()> {
        self.0.push(byte);
        Ok(())
    }
    fn write_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.0.extend_from_slice(bytes);
        Ok(())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
    fn end_of_job(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn erase_write_stream() -> Vec<u8> {
    let mut data = vec![0x05, 0xC3]; // Erase/Write, WCC
    for row in 0..24u16 {
        data.push(0x11); // SBA
        let addr = row * 80;
        data.push((addr >> 8) as u8);
        data.push((addr & 0xFF) as u8);
        data.extend(std::iter::repeat(0xC8).take(78)); // EBCDIC 'H'
    }
    data
}

fn bench_ds_erase_write(c: &mut Criterion) {
    let data = erase_write_stream();
    let opts = DsOptions::default();

    c.bench_function("ds_erase_write_24x80", |b| {
        b.iter(|| {
            let mut ds = DsInterpreter::new(24, 80);
            let mut sink = SinkBuf::default();
            black_box(ds.process(black_box(&data), &mut sink, &opts)).unwrap();
        })
    });
}

fn scs_line_stream() -> Vec<u8> {
    let mut data = Vec::new();
    for _ in 0..200 {
        data.extend(std::iter::repeat(0xC8).take(60)); // plain text run
        data.push(0x15); // NL
    }
    data
}

fn bench_scs_lines(c: &mut Criterion) {
    let data = scs_line_stream();
    let opts = ScsOptions { crlf: false, ffskip: false, ffthru: false };

    c.bench_function("scs_process_200_lines", |b| {
        b.iter(|| {
            let mut scs = ScsInterpreter::new(false);
            let mut sink = SinkBuf::default();
            black_box(scs.process(black_box(&data), &mut sink, CharSet::Cp037, None, opts)).unwrap();
        })
    });
}

criterion_group!(benches, bench_ds_erase_write, bench_scs_lines);
criterion_main!(benches);
