/// CSV fallback source
///
/// When the warehouse is unreachable the service loads the same data from
/// the CSV exports the generator produces (and Hive ingests). Two files with
/// a fixed column schema are understood:
///
/// - `portfolio_stations.csv`: [`STATION_COLUMNS`]
/// - `portfolio_observations.csv`: [`OBSERVATION_COLUMNS`]
///
/// Files are streamed line by line so multi-million-row exports never sit
/// in memory. Rows are handed out as [`Record`]s keyed by the header line.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Arc;

use crate::model::SourceError;
use crate::source::Record;

pub const STATION_COLUMNS: &[&str] = &[
    "station_id",
    "station_name",
    "country",
    "region",
    "latitude",
    "longitude",
    "elevation",
    "is_coastal",
    "is_active",
];

pub const OBSERVATION_COLUMNS: &[&str] = &[
    "station_id",
    "observation_date",
    "year",
    "month",
    "temp_max",
    "temp_min",
    "temp_mean",
    "precipitation",
    "humidity",
    "sea_surface_temp",
    "ocean_salinity",
    "region",
];

// ============================================================================
// Line parsing
// ============================================================================

/// Split one CSV line into fields.
///
/// Handles double-quoted fields containing commas and `""` escapes. Quoted
/// fields spanning several lines are not supported; the exports never
/// contain them.
pub fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            ('"', true) => in_quotes = false,
            ('"', false) if current.is_empty() => in_quotes = true,
            (',', false) => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Quote a field for output if it needs it.
pub fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Streaming reader yielding one [`Record`] per data line.
///
/// Blank lines are skipped. Short rows yield records whose trailing fields
/// read as missing, so validation downstream reports them. A line that is
/// not valid UTF-8 yields an `Err` for that row and reading continues. An
/// I/O error ends iteration; it is kept and returned by
/// [`CsvRecords::finish`].
pub struct CsvRecords<R: BufRead> {
    reader: R,
    buf: Vec<u8>,
    line_no: usize,
    columns: Arc<[String]>,
    limit: Option<usize>,
    yielded: usize,
    error: Option<SourceError>,
}

impl CsvRecords<BufReader<File>> {
    /// Open `path` and read its header.
    pub fn open(path: &Path, limit: Option<usize>) -> Result<Self, SourceError> {
        let file = File::open(path)?;
        CsvRecords::from_reader(BufReader::new(file), limit)
    }
}

impl<R: BufRead> CsvRecords<R> {
    pub fn from_reader(mut reader: R, limit: Option<usize>) -> Result<Self, SourceError> {
        let mut buf = Vec::new();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Err(SourceError::Parse("empty CSV file, no header".to_string()));
        }
        let header = std::str::from_utf8(&buf)
            .map_err(|e| SourceError::Parse(format!("CSV header is not valid UTF-8: {}", e)))?;
        let columns: Arc<[String]> = split_line(header.trim_start_matches('\u{feff}').trim_end_matches(['\n', '\r']))
            .into_iter()
            .map(|c| c.trim().to_string())
            .collect();

        Ok(CsvRecords { reader, buf, line_no: 1, columns, limit, yielded: 0, error: None })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Check the header carries every column in `required`.
    pub fn expect_columns(&self, required: &[&str]) -> Result<(), SourceError> {
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|c| !self.columns.iter().any(|h| h == c))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SourceError::Parse(format!("CSV header is missing columns: {}", missing.join(", "))))
        }
    }

    /// Data lines read so far (excluding the header), undecodable ones included.
    pub fn rows_read(&self) -> usize {
        self.yielded
    }

    /// Surface any I/O error that cut iteration short.
    pub fn finish(self) -> Result<usize, SourceError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.yielded),
        }
    }
}

impl<R: BufRead> Iterator for CsvRecords<R> {
    type Item = Result<Record, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.error.is_some() || self.limit.is_some_and(|l| self.yielded >= l) {
            return None;
        }

        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => self.line_no += 1,
                Err(e) => {
                    self.error = Some(SourceError::Io(e));
                    return None;
                }
            }

            let line = match std::str::from_utf8(&self.buf) {
                Ok(line) => line.trim_end_matches(['\n', '\r']),
                Err(e) => {
                    self.yielded += 1;
                    return Some(Err(SourceError::Parse(format!(
                        "line {}: not valid UTF-8 ({})",
                        self.line_no, e
                    ))));
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let values = split_line(line).into_iter().map(Some).collect();
            self.yielded += 1;
            return Some(Ok(Record::new(Arc::clone(&self.columns), values)));
        }
    }
}

// ============================================================================
// Writer
// ============================================================================

/// Minimal CSV writer for the generator: header first, then rows.
pub struct CsvWriter<W: Write> {
    out: W,
    width: usize,
    rows: usize,
}

impl<W: Write> CsvWriter<W> {
    pub fn new(mut out: W, header: &[&str]) -> std::io::Result<Self> {
        writeln!(out, "{}", header.join(","))?;
        Ok(CsvWriter { out, width: header.len(), rows: 0 })
    }

    pub fn write_row(&mut self, fields: &[String]) -> std::io::Result<()> {
        if fields.len() != self.width {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("row has {} fields, header has {}", fields.len(), self.width),
            ));
        }
        let line: Vec<String> = fields.iter().map(|f| escape_field(f)).collect();
        writeln!(self.out, "{}", line.join(","))?;
        self.rows += 1;
        Ok(())
    }

    pub fn finish(mut self) -> std::io::Result<usize> {
        self.out.flush()?;
        Ok(self.rows)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const STATIONS: &str = "station_id,station_name,country,region,latitude,longitude,elevation,is_coastal,is_active\n\
KE-EAS-00000,Station KE-EAS-00000,KE,East,-1.2864,36.8172,1795.0,False,True\n\
\n\
NG-WES-00001,\"Lagos, Marina\",NG,West,6.4541,3.3947,,True,True\n";

    #[test]
    fn test_split_line_handles_quotes() {
        assert_eq!(split_line("a,b,,d"), vec!["a", "b", "", "d"]);
        assert_eq!(split_line("\"x, y\",z"), vec!["x, y", "z"]);
        assert_eq!(split_line("\"say \"\"hi\"\"\",1"), vec!["say \"hi\"", "1"]);
    }

    #[test]
    fn test_reader_yields_records_by_header() {
        let reader = CsvRecords::from_reader(Cursor::new(STATIONS), None).unwrap();
        reader.expect_columns(STATION_COLUMNS).unwrap();
        let records: Vec<Record> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 2, "blank line skipped");
        assert_eq!(records[1].raw("station_name"), Some("Lagos, Marina"));
        assert_eq!(records[1].float("elevation"), Ok(None));
        assert_eq!(records[0].flag("is_coastal"), Ok(Some(false)));
    }

    #[test]
    fn test_reader_honours_limit() {
        let mut reader = CsvRecords::from_reader(Cursor::new(STATIONS), Some(1)).unwrap();
        assert!(reader.next().is_some());
        assert!(reader.next().is_none());
        assert_eq!(reader.finish().unwrap(), 1);
    }

    #[test]
    fn test_missing_columns_are_reported() {
        let reader = CsvRecords::from_reader(Cursor::new("station_id,year\n"), None).unwrap();
        let err = reader.expect_columns(OBSERVATION_COLUMNS).unwrap_err();
        assert!(err.to_string().contains("observation_date"));
    }

    #[test]
    fn test_empty_input_has_no_header() {
        assert!(CsvRecords::from_reader(Cursor::new(""), None).is_err());
    }

    #[test]
    fn test_writer_output_reads_back() {
        let mut buf = Vec::new();
        let mut writer = CsvWriter::new(&mut buf, &["station_id", "station_name"]).unwrap();
        writer.write_row(&["A-1".to_string(), "Cape Town, Harbour".to_string()]).unwrap();
        assert!(writer.write_row(&["only-one".to_string()]).is_err());
        assert_eq!(writer.finish().unwrap(), 1);

        let records: Vec<Record> = CsvRecords::from_reader(Cursor::new(buf), None)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records[0].raw("station_name"), Some("Cape Town, Harbour"));
    }

    #[test]
    fn test_undecodable_line_is_a_row_error() {
        let mut input = b"station_id,station_name\nA-1,Nairobi\nA-2,Mal".to_vec();
        input.extend_from_slice(&[0xFF, 0xFE]);
        input.extend_from_slice(b"\r\nA-3,Accra\r\n");

        let mut reader = CsvRecords::from_reader(Cursor::new(input), None).unwrap();
        assert_eq!(reader.next().unwrap().unwrap().raw("station_id"), Some("A-1"));
        let err = reader.next().unwrap().unwrap_err();
        assert!(err.to_string().contains("line 3"));
        let last = reader.next().unwrap().unwrap();
        assert_eq!(last.raw("station_name"), Some("Accra"));
        assert!(reader.next().is_none());
        assert_eq!(reader.finish().unwrap(), 3);
    }

    /// Yields its bytes, then fails every read.
    struct FailingReader {
        data: Cursor<Vec<u8>>,
    }

    impl std::io::Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = std::io::Read::read(&mut self.data, buf)?;
            if n == 0 { Err(std::io::Error::other("connection reset")) } else { Ok(n) }
        }
    }

    #[test]
    fn test_io_error_stops_iteration_and_is_kept() {
        let data = Cursor::new(b"station_id\nA-1\nA-2\n".to_vec());
        let mut reader =
            CsvRecords::from_reader(BufReader::new(FailingReader { data }), None).unwrap();
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().is_none());
        assert!(reader.next().is_none());
        assert!(matches!(reader.finish(), Err(SourceError::Io(_))));
    }
}
