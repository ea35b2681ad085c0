use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use gastrack_format::{CELL_COUNT, MODULE_COUNT};

use crate::report::FrameReport;

/// Appends one CSV row per frame: the differential cells, the module
/// concentrations, then the estimate (empty when undefined).
pub struct FrameStore<W: Write> {
    writer: W,
    header_written: bool,
}

impl FrameStore<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> FrameStore<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            header_written: false,
        }
    }

    pub fn store(&mut self, report: &FrameReport) -> io::Result<()> {
        if !self.header_written {
            self.write_header()?;
            self.header_written = true;
        }

        for d in report.frame.iter() {
            write!(&mut self.writer, "{},", d)?;
        }
        for c in report.concentrations.iter() {
            write!(&mut self.writer, "{},", c)?;
        }
        match report.bearing.estimate() {
            Some(estimate) => writeln!(&mut self.writer, "{},{}", estimate.x, estimate.y)?,
            None => writeln!(&mut self.writer, ",")?,
        }
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_header(&mut self) -> io::Result<()> {
        (0..CELL_COUNT).try_for_each(|i| write!(&mut self.writer, "d{},", i))?;
        (0..MODULE_COUNT).try_for_each(|i| write!(&mut self.writer, "c{},", i))?;
        writeln!(&mut self.writer, "x,y")
    }
}
