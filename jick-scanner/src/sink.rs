use crate::endpoint::Endpoint;
use crate::error::Result;
use std::io::Write;

/// Destination for discovered endpoints once a crawl is done.
pub trait EndpointSink {
    fn write_endpoint(&mut self, endpoint: &Endpoint) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes one `<METHOD> <URL>` line per endpoint.
pub struct LineSink<W: Write> {
    writer: W,
}

impl<W: Write> LineSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> EndpointSink for LineSink<W> {
    fn write_endpoint(&mut self, endpoint: &Endpoint) -> Result<()> {
        writeln!(self.writer, "{} {}", endpoint.method, endpoint.url)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl EndpointSink for Vec<Endpoint> {
    fn write_endpoint(&mut self, endpoint: &Endpoint) -> Result<()> {
        self.push(endpoint.clone());
        Ok(())
    }
}

/// Writes every endpoint in order, then finishes the sink.
pub fn flush_all<'a>(
    endpoints: impl IntoIterator<Item = &'a Endpoint>,
    sink: &mut dyn EndpointSink,
) -> Result<()> {
    for endpoint in endpoints {
        sink.write_endpoint(endpoint)?;
    }
    sink.finish()
}
