use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Day of the week, in grid column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Day {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Day {
    /// All days, Sunday first.
    pub const ALL: [Day; 7] = [
        Day::Sunday,
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Day::Sunday => "Sunday",
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
            Day::Saturday => "Saturday",
        }
    }

    /// Three-letter abbreviation used for grid headers.
    pub fn short_name(&self) -> &'static str {
        &self.name()[..3]
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Day {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sunday" | "sun" => Ok(Day::Sunday),
            "monday" | "mon" => Ok(Day::Monday),
            "tuesday" | "tue" => Ok(Day::Tuesday),
            "wednesday" | "wed" => Ok(Day::Wednesday),
            "thursday" | "thu" => Ok(Day::Thursday),
            "friday" | "fri" => Ok(Day::Friday),
            "saturday" | "sat" => Ok(Day::Saturday),
            _ => Err(format!(
                "Invalid day '{}'. Valid options: sunday, monday, tuesday, wednesday, thursday, friday, saturday",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_display() {
        assert_eq!(format!("{}", Day::Sunday), "Sunday");
        assert_eq!(format!("{}", Day::Wednesday), "Wednesday");
        assert_eq!(Day::Thursday.short_name(), "Thu");
    }

    #[test]
    fn test_day_from_str() {
        assert_eq!(Day::from_str("monday").unwrap(), Day::Monday);
        assert_eq!(Day::from_str("FRIDAY").unwrap(), Day::Friday);
        assert_eq!(Day::from_str("Sat").unwrap(), Day::Saturday);
    }

    #[test]
    fn test_day_from_str_invalid() {
        let err = Day::from_str("someday").unwrap_err();
        assert!(err.contains("Valid options"));
        assert!(Day::from_str("").is_err());
    }

    #[test]
    fn test_day_order_starts_on_sunday() {
        assert_eq!(Day::ALL[0], Day::Sunday);
        assert_eq!(Day::ALL[6], Day::Saturday);
        assert!(Day::Monday < Day::Tuesday);
    }
}
