use std::io;
use std::path::Path;

use jiff::Timestamp;
use jiff::tz::TimeZone;
use tracing::warn;

use pymonorepo_static::EnvVars;

/// 2016-01-01T00:00:00Z, used for generated entries when no timestamp is fixed.
const GENERATED_TIMESTAMP: i64 = 1_451_606_400;

/// The timestamp source for archive entries.
///
/// With a fixed timestamp, every entry uses it and archives are byte-for-byte reproducible.
/// Otherwise generated entries use 2016-01-01 and copied files keep their modification time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SourceDateEpoch {
    #[default]
    Unset,
    /// Seconds since the Unix epoch.
    Fixed(i64),
}

impl SourceDateEpoch {
    /// Read `SOURCE_DATE_EPOCH`, ignoring values that are not an integer.
    pub fn from_env() -> Self {
        Self::parse(std::env::var(EnvVars::SOURCE_DATE_EPOCH).ok().as_deref())
    }

    pub fn parse(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self::Unset;
        };
        match value.trim().parse::<i64>() {
            Ok(seconds) => Self::Fixed(seconds),
            Err(err) => {
                warn!(
                    "Ignoring invalid `{}={value}`: {err}",
                    EnvVars::SOURCE_DATE_EPOCH
                );
                Self::Unset
            }
        }
    }

    /// The timestamp of an entry generated by the build.
    pub(crate) fn generated(self) -> i64 {
        match self {
            Self::Fixed(seconds) => seconds,
            Self::Unset => GENERATED_TIMESTAMP,
        }
    }

    /// The timestamp of an entry copied from `source`.
    pub(crate) fn copied(self, source: &Path) -> io::Result<i64> {
        match self {
            Self::Fixed(seconds) => Ok(seconds),
            Self::Unset => {
                let modified = fs_err::metadata(source)?.modified()?;
                Ok(Timestamp::try_from(modified)
                    .map(Timestamp::as_second)
                    .unwrap_or(GENERATED_TIMESTAMP))
            }
        }
    }

    /// The modification time in the gzip header, `0` meaning none.
    pub(crate) fn gzip_mtime(self) -> u32 {
        match self {
            Self::Fixed(seconds) => u32::try_from(seconds.max(0)).unwrap_or(u32::MAX),
            Self::Unset => 0,
        }
    }
}

/// Convert to a zip (DOS) timestamp, which can't represent dates before 1980-01-01.
pub(crate) fn zip_datetime(seconds: i64) -> zip::DateTime {
    let Ok(timestamp) = Timestamp::from_second(seconds) else {
        return zip::DateTime::default();
    };
    let datetime = timestamp.to_zoned(TimeZone::UTC).datetime();
    dos_datetime(datetime).unwrap_or_default()
}

fn dos_datetime(datetime: jiff::civil::DateTime) -> Option<zip::DateTime> {
    zip::DateTime::from_date_and_time(
        u16::try_from(datetime.year()).ok()?,
        u8::try_from(datetime.month()).ok()?,
        u8::try_from(datetime.day()).ok()?,
        u8::try_from(datetime.hour()).ok()?,
        u8::try_from(datetime.minute()).ok()?,
        u8::try_from(datetime.second()).ok()?,
    )
    .ok()
}

/// Tar headers store unsigned seconds.
pub(crate) fn tar_mtime(seconds: i64) -> u64 {
    u64::try_from(seconds).unwrap_or(0)
}
