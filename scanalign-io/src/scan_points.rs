//! `v x y z vn nx ny nz` scan point format

use crate::error::{IoError, IoResult};
use scanalign_core::{NormalPoint3f, NormalPointCloud3f, Point3f, Vector3f};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Writer for posed scan points
pub struct ScanPointWriter;

impl ScanPointWriter {
    /// Write one line per point to `writer`
    pub fn write_to<W: Write>(writer: &mut W, cloud: &NormalPointCloud3f) -> IoResult<()> {
        for point in cloud.iter() {
            let (p, n) = (&point.position, &point.normal);
            writeln!(
                writer,
                "v {:.4} {:.4} {:.4} vn {:.6} {:.6} {:.6}",
                p.x, p.y, p.z, n.x, n.y, n.z
            )?;
        }
        Ok(())
    }

    /// Write several scans, one after the other, to a new file at `path`
    pub fn write<'a, P, I>(path: P, clouds: I) -> IoResult<()>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = &'a NormalPointCloud3f>,
    {
        let path = path.as_ref();
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        let mut count = 0;
        for cloud in clouds {
            Self::write_to(&mut writer, cloud)?;
            count += cloud.len();
        }

        writer.flush()?;
        log::debug!("wrote {} points to {}", count, path.display());
        Ok(())
    }
}

/// Reader for files produced by [`ScanPointWriter`]
pub struct ScanPointReader;

impl ScanPointReader {
    /// Read every point line from `reader`. Blank lines and `#` comments are skipped.
    pub fn read_from<R: Read>(reader: R) -> IoResult<NormalPointCloud3f> {
        let mut cloud = NormalPointCloud3f::new();

        for (idx, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            cloud.push(Self::parse_line(trimmed, idx + 1)?);
        }

        Ok(cloud)
    }

    /// Read a scan point file
    pub fn read<P: AsRef<Path>>(path: P) -> IoResult<NormalPointCloud3f> {
        let file = File::open(path)?;
        Self::read_from(file)
    }

    fn parse_line(line: &str, line_number: usize) -> IoResult<NormalPoint3f> {
        let error = |message: String| IoError::ParseError {
            line: line_number,
            message,
        };

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != 8 || tokens[0] != "v" || tokens[4] != "vn" {
            return Err(error(format!("expected `v x y z vn nx ny nz`, found `{}`", line)));
        }

        let mut values = [0.0f32; 6];
        for (value, token) in values
            .iter_mut()
            .zip(tokens[1..4].iter().chain(tokens[5..8].iter()))
        {
            *value = token
                .parse()
                .map_err(|_| error(format!("invalid number `{}`", token)))?;
        }

        Ok(NormalPoint3f::new(
            Point3f::new(values[0], values[1], values[2]),
            Vector3f::new(values[3], values[4], values[5]),
        ))
    }
}
