//! Parsing of `raid` target status lines.
//!
//! ```text
//! <raid_type> <#devs> <health_chars> <synced>/<total> [<sync_action> <mismatch_cnt>]
//! raid1 2 AA 1024000/1024000
//! ```

use nom::IResult;
use nom::branch::alt;
use nom::character::complete::{char, multispace1, u64 as number};
use nom::combinator::{eof, value};
use nom::sequence::{separated_pair, terminated};

use crate::error::{Error, Result};
use crate::metadata::Segment;
use crate::percent::{Percent, PercentTotals};

/// Any target type containing `raid` belongs to the family.
pub(super) fn compatible(target_type: &str) -> bool {
    target_type.contains("raid")
}

fn fraction(input: &str) -> IResult<&str, Percent> {
    let (input, (numerator, denominator)) = terminated(
        separated_pair(number, char('/'), number),
        alt((value((), eof), value((), multispace1))),
    )(input)?;
    Ok((input, Percent::new(numerator, denominator)))
}

/// Skips the first three space-separated fields and reads `<synced>/<total>`.
#[must_use]
pub fn parse_sync_fraction(params: &str) -> Option<Percent> {
    let mut rest = params;
    for _ in 0..3 {
        rest = rest.split_once(' ')?.1;
    }
    fraction(rest).ok().map(|(_, p)| p)
}

pub(super) fn target_percent(
    segtype: &str,
    params: &str,
    seg: Option<&mut Segment>,
    totals: &mut PercentTotals,
) -> Result<Percent> {
    let percent = parse_sync_fraction(params)
        .filter(|p| p.denominator != 0)
        .ok_or_else(|| {
            Error::Parse {
                segtype: segtype.into(),
                text: params.into(),
            }
            .logged()
        })?;

    totals.add(percent);

    if let Some(seg) = seg {
        let copied = u128::from(seg.area_len) * u128::from(percent.numerator)
            / u128::from(percent.denominator);
        seg.extents_copied = u64::try_from(copied).unwrap_or(u64::MAX);
    }

    Ok(percent)
}

/// Health of one member device as reported in the status line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DevHealth {
    /// `A`: alive and in sync.
    InSync,
    /// `a`: alive, still recovering.
    Recovering,
    /// `D`: dead or failed.
    Dead,
}

impl DevHealth {
    const fn from_char(c: char) -> Option<Self> {
        match c {
            'A' => Some(Self::InSync),
            'a' => Some(Self::Recovering),
            'D' => Some(Self::Dead),
            _ => None,
        }
    }
}

/// A fully decoded status line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RaidStatus {
    pub raid_type: String,
    pub devices: Vec<DevHealth>,
    pub sync: Percent,
    /// Present on kernels that report the current sync action (`idle`, `resync`, ...).
    pub sync_action: Option<String>,
}

impl RaidStatus {
    /// Parses a whole status line, also validating the device count and health characters.
    #[must_use]
    pub fn parse(params: &str) -> Option<Self> {
        let mut fields = params.split(' ');
        let raid_type = fields.next()?.to_string();
        let count: usize = fields.next()?.parse().ok()?;
        let devices = fields
            .next()?
            .chars()
            .map(DevHealth::from_char)
            .collect::<Option<Vec<_>>>()?;
        if devices.len() != count {
            return None;
        }
        let sync = parse_sync_fraction(params)?;
        fields.next()?;
        let sync_action = fields.next().filter(|s| !s.is_empty()).map(str::to_string);
        Some(Self {
            raid_type,
            devices,
            sync,
            sync_action,
        })
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.devices.iter().any(|d| *d == DevHealth::Dead)
    }
}
