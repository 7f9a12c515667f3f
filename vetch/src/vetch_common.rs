#![allow(dead_code)]

pub type Mat = nalgebra::DMatrix<f64>;

pub use dense_util::traits::{IoOps, MatWithNames};
pub use log::{info, warn};

pub use clap::{Args, ValueEnum};

use mung::factorization::InitMethod;
use mung::geometry::{BoundsPolicy, SpotPooling, SpotShape};

/// columns in coordinate and expression tables may be tab, comma or
/// space separated
pub const TABLE_DELIM: &[char; 3] = &['\t', ',', ' '];

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum BoundsArg {
    Drop,
    Clamp,
    Reflect,
}

impl From<BoundsArg> for BoundsPolicy {
    fn from(v: BoundsArg) -> Self {
        match v {
            BoundsArg::Drop => BoundsPolicy::Drop,
            BoundsArg::Clamp => BoundsPolicy::Clamp,
            BoundsArg::Reflect => BoundsPolicy::Reflect,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum ShapeArg {
    Square,
    Disc,
}

impl From<ShapeArg> for SpotShape {
    fn from(v: ShapeArg) -> Self {
        match v {
            ShapeArg::Square => SpotShape::Square,
            ShapeArg::Disc => SpotShape::Disc,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum PoolingArg {
    Flatten,
    Moments,
}

impl From<PoolingArg> for SpotPooling {
    fn from(v: PoolingArg) -> Self {
        match v {
            PoolingArg::Flatten => SpotPooling::Flatten,
            PoolingArg::Moments => SpotPooling::ChannelMoments,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum InitArg {
    Random,
    PartialSvd,
}

impl From<InitArg> for InitMethod {
    fn from(v: InitArg) -> Self {
        match v {
            InitArg::Random => InitMethod::Random,
            InitArg::PartialSvd => InitMethod::PartialSvd,
        }
    }
}

/// parse `name=value` pairs from the command line
pub fn parse_key_val(s: &str) -> anyhow::Result<(Box<str>, Box<str>)> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("expected NAME=VALUE, got '{}'", s))?;
    Ok((k.trim().into(), v.trim().into()))
}
