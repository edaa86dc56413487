//! Bars from local CSV files.
//!
//! Each symbol is mapped to one file. Headers are matched case-insensitively against
//! [`CsvColumns`]; any value column may be missing from the file, but at least one must be
//! present next to the date column. A row whose date or numbers don't parse is skipped
//! with a warning rather than failing the whole file.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::warn;

use crate::{
    models::{
        bar::{DailyBar, normalize_series},
        window::DateWindow,
    },
    providers::{MarketDataSource, SourceError},
};

/// Header names for each bar field.
#[derive(Clone, Debug)]
pub struct CsvColumns {
    pub date: String,
    pub open: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
    pub close: Option<String>,
    pub volume: Option<String>,
    pub indicator: Option<String>,
}

impl Default for CsvColumns {
    fn default() -> Self {
        Self {
            date: "Date".into(),
            open: Some("Open".into()),
            high: Some("High".into()),
            low: Some("Low".into()),
            close: Some("Close".into()),
            volume: Some("Volume".into()),
            indicator: Some("dtcai".into()),
        }
    }
}

impl CsvColumns {
    /// Columns for a file that only supplies the auxiliary indicator.
    pub fn indicator_only(column: impl Into<String>) -> Self {
        Self {
            open: None,
            high: None,
            low: None,
            close: None,
            volume: None,
            indicator: Some(column.into()),
            ..Self::default()
        }
    }
}

struct Positions {
    date: usize,
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    close: Option<usize>,
    volume: Option<usize>,
    indicator: Option<usize>,
}

impl Positions {
    fn locate(symbol: &str, headers: &StringRecord, cols: &CsvColumns) -> Result<Self, SourceError> {
        let find = |name: &Option<String>| {
            name.as_deref().and_then(|n| {
                headers
                    .iter()
                    .position(|h| h.trim().eq_ignore_ascii_case(n.trim()))
            })
        };

        let date = find(&Some(cols.date.clone())).ok_or_else(|| {
            SourceError::malformed(symbol, format!("missing date column '{}'", cols.date))
        })?;

        let pos = Self {
            date,
            open: find(&cols.open),
            high: find(&cols.high),
            low: find(&cols.low),
            close: find(&cols.close),
            volume: find(&cols.volume),
            indicator: find(&cols.indicator),
        };

        if [pos.open, pos.high, pos.low, pos.close, pos.volume, pos.indicator]
            .iter()
            .all(Option::is_none)
        {
            return Err(SourceError::malformed(symbol, "no value columns found"));
        }
        Ok(pos)
    }
}

/// Serves bars from per-symbol CSV files.
#[derive(Clone, Debug, Default)]
pub struct CsvFileSource {
    files: HashMap<String, PathBuf>,
    columns: CsvColumns,
}

impl CsvFileSource {
    pub fn new(columns: CsvColumns) -> Self {
        Self {
            files: HashMap::new(),
            columns,
        }
    }

    /// Maps `symbol` to `path`.
    pub fn with_file(mut self, symbol: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.files.insert(symbol.into(), path.into());
        self
    }
}

#[async_trait]
impl MarketDataSource for CsvFileSource {
    fn name(&self) -> &str {
        "csv-file"
    }

    async fn fetch(&self, symbol: &str, window: DateWindow) -> Result<Vec<DailyBar>, SourceError> {
        let Some(path) = self.files.get(symbol).cloned() else {
            return Err(SourceError::empty(symbol));
        };
        let columns = self.columns.clone();
        let owned_symbol = symbol.to_string();

        tokio::task::spawn_blocking(move || read_bars(&owned_symbol, &path, &columns, &window))
            .await
            .map_err(|e| SourceError::unavailable(symbol, format!("reader task failed: {e}")))?
    }
}

/// Reads the bars of one CSV file that fall inside `window`.
pub fn read_bars(
    symbol: &str,
    path: &Path,
    columns: &CsvColumns,
    window: &DateWindow,
) -> Result<Vec<DailyBar>, SourceError> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| {
            SourceError::unavailable(symbol, format!("cannot open {}: {e}", path.display()))
        })?;

    let headers = rdr
        .headers()
        .map_err(|e| SourceError::malformed(symbol, format!("unreadable header: {e}")))?
        .clone();
    let pos = Positions::locate(symbol, &headers, columns)?;

    let mut bars = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        // header is line 1
        let line = line + 2;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!(symbol, line, error = %e, "skipping unreadable row");
                continue;
            }
        };

        match parse_row(&record, &pos) {
            Ok(bar) if window.contains(bar.date) && !bar.is_blank() => bars.push(bar),
            Ok(_) => {}
            Err(reason) => warn!(symbol, line, %reason, "skipping row"),
        }
    }

    if bars.is_empty() {
        return Err(SourceError::empty(symbol));
    }
    Ok(normalize_series(bars))
}

fn parse_row(record: &StringRecord, pos: &Positions) -> Result<DailyBar, String> {
    let raw_date = record.get(pos.date).unwrap_or_default();
    let date = parse_date(raw_date).ok_or_else(|| format!("bad date '{raw_date}'"))?;

    let num = |idx: Option<usize>| -> Result<Option<f64>, String> {
        match idx.and_then(|i| record.get(i)).map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => s
                .parse::<f64>()
                .map(Some)
                .map_err(|_| format!("bad number '{s}'")),
        }
    };

    let volume = match num(pos.volume)? {
        None => None,
        Some(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 9.0e18 => Some(v as i64),
        Some(v) => return Err(format!("bad volume '{v}'")),
    };

    Ok(DailyBar {
        date,
        open: num(pos.open)?,
        high: num(pos.high)?,
        low: num(pos.low)?,
        close: num(pos.close)?,
        volume,
        indicator: num(pos.indicator)?,
    }
    .sanitized())
}

/// Accepts `YYYY-MM-DD`, the same with a time part, or `MM/DD/YYYY`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").map(|dt| dt.date()))
        .or_else(|_| NaiveDate::parse_from_str(s, "%m/%d/%Y"))
        .ok()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::providers::SourceErrorKind;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn window() -> DateWindow {
        DateWindow::new(d(2019, 1, 1), d(2019, 12, 31)).unwrap()
    }

    fn file(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn reads_indicator_file_and_skips_bad_rows() {
        let f = file(
            "Date,Close,dtcai\n\
             2019-01-03,2447.89,0.41\n\
             2019-01-02,2510.03,0.37\n\
             not-a-date,1.0,0.1\n\
             2019-01-04,2531.94,oops\n\
             2018-12-31,2506.85,0.35\n",
        );

        let bars = read_bars("^GSPC", f.path(), &CsvColumns::default(), &window()).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, d(2019, 1, 2));
        assert_eq!(bars[0].close, Some(2510.03));
        assert_eq!(bars[0].indicator, Some(0.37));
        assert_eq!(bars[1].date, d(2019, 1, 3));
        assert!(bars.iter().all(|b| b.open.is_none() && b.volume.is_none()));
    }

    #[test]
    fn indicator_only_columns_ignore_prices() {
        let f = file("date,close,DTCAI\n01/02/2019,2510.03,0.37\n");

        let bars = read_bars(
            "^GSPC",
            f.path(),
            &CsvColumns::indicator_only("dtcai"),
            &window(),
        )
        .unwrap();
        assert_eq!(bars, vec![DailyBar::empty(d(2019, 1, 2)).with_indicator(0.37)]);
    }

    #[test]
    fn missing_date_column_is_malformed() {
        let f = file("Day,Close\n2019-01-02,1.0\n");
        let err = read_bars("X", f.path(), &CsvColumns::default(), &window()).unwrap_err();
        assert_eq!(err.kind(), SourceErrorKind::Malformed);
    }

    #[test]
    fn no_rows_in_window_is_empty() {
        let f = file("Date,Close\n2020-01-02,1.0\n");
        let err = read_bars("X", f.path(), &CsvColumns::default(), &window()).unwrap_err();
        assert_eq!(err.kind(), SourceErrorKind::Empty);
    }

    #[test]
    fn missing_file_is_unavailable() {
        let err = read_bars(
            "X",
            Path::new("/no/such/file.csv"),
            &CsvColumns::default(),
            &window(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), SourceErrorKind::Unavailable);
    }

    #[test]
    fn date_formats() {
        assert_eq!(parse_date("2019-01-02"), Some(d(2019, 1, 2)));
        assert_eq!(parse_date("2019-01-02 00:00:00"), Some(d(2019, 1, 2)));
        assert_eq!(parse_date("2019-01-02T16:00:00"), Some(d(2019, 1, 2)));
        assert_eq!(parse_date("01/02/2019"), Some(d(2019, 1, 2)));
        assert_eq!(parse_date("2 Jan 2019"), None);
    }

    #[tokio::test]
    async fn unmapped_symbol_is_empty() {
        let source = CsvFileSource::new(CsvColumns::default());
        let err = source.fetch("BTC-USD", window()).await.unwrap_err();
        assert_eq!(err.kind(), SourceErrorKind::Empty);
    }
}
