//! Checkout contact fields.
//!
//! The backend validates these too, but checking locally keeps an obviously
//! incomplete form from consuming the cart round trip.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing contact fields.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ContactError {
    /// The phone number is shorter than the minimum.
    #[error("Phone number must be at least {min} characters")]
    PhoneTooShort {
        /// Minimum allowed length.
        min: usize,
    },
    /// The address is shorter than the minimum.
    #[error("Address must be at least {min} characters")]
    AddressTooShort {
        /// Minimum allowed length.
        min: usize,
    },
}

impl ContactError {
    /// Name of the form field the error belongs to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::PhoneTooShort { .. } => "phone",
            Self::AddressTooShort { .. } => "address",
        }
    }
}

/// A delivery contact phone number.
///
/// ## Constraints
///
/// - At least 8 characters after trimming
///
/// ## Examples
///
/// ```
/// use shopfront_core::Phone;
///
/// assert!(Phone::parse("012 345 678").is_ok());
/// assert!(Phone::parse("1234").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Phone(String);

impl Phone {
    /// Minimum length of a phone number.
    pub const MIN_LENGTH: usize = 8;

    /// Parse a `Phone` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is shorter than 8 characters.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let trimmed = s.trim();
        if trimmed.chars().count() < Self::MIN_LENGTH {
            return Err(ContactError::PhoneTooShort {
                min: Self::MIN_LENGTH,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the phone number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Phone` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A free-form delivery address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct DeliveryAddress(String);

impl DeliveryAddress {
    /// Minimum length of an address.
    pub const MIN_LENGTH: usize = 5;

    /// Parse a `DeliveryAddress` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is shorter than 5 characters.
    pub fn parse(s: &str) -> Result<Self, ContactError> {
        let trimmed = s.trim();
        if trimmed.chars().count() < Self::MIN_LENGTH {
            return Err(ContactError::AddressTooShort {
                min: Self::MIN_LENGTH,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `DeliveryAddress` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for DeliveryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
