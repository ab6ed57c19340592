//! Stellar variability classes
//!
//! Stored result rows carry the class label as text; ensemble input is
//! translated back into this typed enumeration when tasks are built for
//! the meta classifier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Stellar variability classes assigned by the classifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StellarClass {
    /// Solar-like oscillators
    SolarLike,
    /// Eclipsing binaries and transits
    Eclipse,
    /// RR Lyrae and Cepheid pulsators
    RrLyrCepheid,
    /// Delta Scuti and Beta Cephei pulsators
    DsctBcep,
    /// Gamma Doradus and SPB pulsators
    GdorSpb,
    /// Transient events
    Transient,
    /// Contact binaries and rotational variables
    ContactRot,
    /// Aperiodic variability
    Aperiodic,
    /// Constant stars
    Constant,
    /// Rapid irregular variability
    Rapid,
}

impl StellarClass {
    /// All classes, in stored-label order
    pub const ALL: [StellarClass; 10] = [
        StellarClass::SolarLike,
        StellarClass::Eclipse,
        StellarClass::RrLyrCepheid,
        StellarClass::DsctBcep,
        StellarClass::GdorSpb,
        StellarClass::Transient,
        StellarClass::ContactRot,
        StellarClass::Aperiodic,
        StellarClass::Constant,
        StellarClass::Rapid,
    ];

    /// Label stored in the results table
    pub fn as_str(self) -> &'static str {
        match self {
            StellarClass::SolarLike => "SOLARLIKE",
            StellarClass::Eclipse => "ECLIPSE",
            StellarClass::RrLyrCepheid => "RRLYR_CEPHEID",
            StellarClass::DsctBcep => "DSCT_BCEP",
            StellarClass::GdorSpb => "GDOR_SPB",
            StellarClass::Transient => "TRANSIENT",
            StellarClass::ContactRot => "CONTACT_ROT",
            StellarClass::Aperiodic => "APERIODIC",
            StellarClass::Constant => "CONSTANT",
            StellarClass::Rapid => "RAPID",
        }
    }
}

impl fmt::Display for StellarClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StellarClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SOLARLIKE" => Ok(StellarClass::SolarLike),
            "ECLIPSE" => Ok(StellarClass::Eclipse),
            "RRLYR_CEPHEID" => Ok(StellarClass::RrLyrCepheid),
            "DSCT_BCEP" => Ok(StellarClass::DsctBcep),
            "GDOR_SPB" => Ok(StellarClass::GdorSpb),
            "TRANSIENT" => Ok(StellarClass::Transient),
            "CONTACT_ROT" => Ok(StellarClass::ContactRot),
            "APERIODIC" => Ok(StellarClass::Aperiodic),
            "CONSTANT" => Ok(StellarClass::Constant),
            "RAPID" => Ok(StellarClass::Rapid),
            other => Err(Error::InvalidInput(format!("Unknown stellar class label: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_round_trip() {
        for class in StellarClass::ALL {
            assert_eq!(class.as_str().parse::<StellarClass>().unwrap(), class);
        }
    }

    #[test]
    fn test_unknown_label_rejected() {
        assert!("NOT_A_CLASS".parse::<StellarClass>().is_err());
    }
}
