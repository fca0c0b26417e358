//! Raw sensor log loading.
//!
//! Logs are comma-separated text: a timestamp column followed by channel
//! columns. Lines starting with `#` and blank lines are skipped, which covers
//! the EuRoC MAV `imu0/data.csv` and `state_groundtruth_estimate0/data.csv`
//! layouts.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use crate::error::{Result, StrapdownError};
use crate::series::TimeSeries;

/// EuRoC timestamps are nanoseconds.
pub const NANOSECONDS: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct CsvOptions {
    /// Multiplier applied to the raw timestamp column.
    pub time_scale: f64,
    /// Channel columns to keep, counted after the timestamp column.
    /// `None` keeps all of them.
    pub columns: Option<Vec<usize>>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            columns: None,
        }
    }
}

impl CsvOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_time_scale(mut self, scale: f64) -> Self {
        self.time_scale = scale;
        self
    }

    pub fn with_columns(mut self, columns: Vec<usize>) -> Self {
        self.columns = Some(columns);
        self
    }
}

/// Load a CSV sensor log into a [`TimeSeries`].
pub fn read_csv_series<P: AsRef<Path>>(path: P, options: &CsvOptions) -> Result<TimeSeries> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let parse_err = |line: usize, reason: String| StrapdownError::Parse {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let mut timestamps = Vec::new();
    let mut values = Vec::new();
    let mut width: Option<usize> = None;

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = Vec::new();
        for field in line.split(',') {
            let field = field.trim();
            let value = field
                .parse::<f64>()
                .map_err(|_| parse_err(line_no, format!("not a number: {field:?}")))?;
            fields.push(value);
        }
        let (t, channels) = fields
            .split_first()
            .ok_or_else(|| parse_err(line_no, "empty row".into()))?;

        match width {
            None => width = Some(channels.len()),
            Some(w) if w != channels.len() => {
                return Err(parse_err(
                    line_no,
                    format!("expected {w} channels, found {}", channels.len()),
                ));
            }
            Some(_) => {}
        }

        match &options.columns {
            Some(columns) => {
                for &c in columns {
                    let v = channels.get(c).ok_or_else(|| {
                        parse_err(line_no, format!("column {c} missing ({} channels)", channels.len()))
                    })?;
                    values.push(*v);
                }
            }
            None => values.extend_from_slice(channels),
        }
        timestamps.push(t * options.time_scale);
    }

    let channels = match &options.columns {
        Some(columns) => columns.len(),
        None => width.unwrap_or(0),
    };
    debug!(path = %path.display(), samples = timestamps.len(), channels, "read sensor log");

    TimeSeries::new(timestamps, channels, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_log(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_reads_euroc_imu_layout() {
        let file = write_log(
            "#timestamp [ns],w_RS_S_x [rad s^-1],w_RS_S_y [rad s^-1],w_RS_S_z [rad s^-1],\
             a_RS_S_x [m s^-2],a_RS_S_y [m s^-2],a_RS_S_z [m s^-2]\n\
             1403636579758555392,-0.099,0.142,0.025,8.125,-0.367,-2.004\n\
             1403636579763555584,-0.100,0.138,0.026,8.097,-0.385,-2.020\n\
             \n",
        );
        let series = read_csv_series(file.path(), &CsvOptions::new().with_time_scale(NANOSECONDS)).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.channels(), 6);
        assert_eq!(series.row(1)[3], 8.097);
        let dt = series.timestamps()[1] - series.timestamps()[0];
        assert!((dt - 0.005).abs() < 1e-6);
    }

    #[test]
    fn test_column_selection() {
        let file = write_log("0,1,2,3\n1,4,5,6\n");
        let series = read_csv_series(file.path(), &CsvOptions::new().with_columns(vec![2, 0])).unwrap();
        assert_eq!(series.channels(), 2);
        assert_eq!(series.row(1), &[6.0, 4.0]);

        let err = read_csv_series(file.path(), &CsvOptions::new().with_columns(vec![3])).unwrap_err();
        assert!(matches!(err, StrapdownError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_malformed_rows() {
        let file = write_log("0,1,2\n1,x,3\n");
        let err = read_csv_series(file.path(), &CsvOptions::new()).unwrap_err();
        assert!(matches!(err, StrapdownError::Parse { line: 2, .. }));

        let file = write_log("0,1,2\n1,2\n");
        let err = read_csv_series(file.path(), &CsvOptions::new()).unwrap_err();
        assert!(err.to_string().contains("expected 2 channels"));
    }

    #[test]
    fn test_unsorted_timestamps_rejected() {
        let file = write_log("1,0.5\n0,0.25\n");
        let err = read_csv_series(file.path(), &CsvOptions::new()).unwrap_err();
        assert!(matches!(err, StrapdownError::Configuration(_)));
    }
}
