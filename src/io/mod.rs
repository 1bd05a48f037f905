mod local;
mod memory;

pub use local::LocalFileReader;
pub use memory::MemoryReader;

use async_trait::async_trait;
use std::io;

/// Trait for random access reading from a data source
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;

    /// Fill the whole buffer, failing with `UnexpectedEof` on a short read
    async fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .read_at(offset + filled as u64, &mut buf[filled..])
                .await?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "wanted {} bytes at offset {offset}, source ended after {filled}",
                        buf.len()
                    ),
                ));
            }
            filled += n;
        }
        Ok(())
    }

    /// Read the entire source into memory
    async fn read_all(&self) -> io::Result<Vec<u8>> {
        let len = usize::try_from(self.size())
            .map_err(|_| io::Error::new(io::ErrorKind::OutOfMemory, "source too large"))?;
        let mut buf = vec![0u8; len];
        self.read_exact_at(0, &mut buf).await?;
        Ok(buf)
    }
}
