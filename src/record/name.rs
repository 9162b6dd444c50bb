//! Annotations encoded in standard 454 read names
//!
//! A standard read name is 14 characters long, e.g. `E3MFGYR02JWQ7T`:
//!
//! * characters 1-6: base-36 encoded acquisition timestamp
//! * character 7: run hash
//! * characters 8-9: decimal region number
//! * characters 10-14: base-36 encoded X/Y location on the plate
//!
//! Names of any other length carry no decodable annotations.

use std::fmt;

/// Length of a standard 454 read name
pub const STANDARD_NAME_LENGTH: usize = 14;

const TIME_DENOMINATORS: [u64; 5] = [
    13 * 32 * 24 * 60 * 60,
    32 * 24 * 60 * 60,
    24 * 60 * 60,
    60 * 60,
    60,
];

/// Acquisition time decoded from a read name
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReadTime {
    pub year: u16,
    pub month: u16,
    pub day: u16,
    pub hour: u16,
    pub minute: u16,
    pub second: u16,
}
impl ReadTime {
    /// The run prefix as printed by the vendor tools, e.g. `R_2008_01_09_16_16_00_`
    #[must_use]
    pub fn run_prefix(&self) -> String {
        format!(
            "R_{:04}_{:02}_{:02}_{:02}_{:02}_{:02}_",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }

    #[must_use]
    pub fn as_array(&self) -> [u16; 6] {
        [
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
        ]
    }
}
impl fmt::Display for ReadTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Digits `0-9` map to 26-35, letters (either case) to 0-25, anything else to 0
fn base36(chars: &[u8]) -> u64 {
    chars.iter().fold(0, |total, &c| {
        let value = match c {
            b'0'..=b'9' => c - b'0' + 26,
            b'A'..=b'Z' => c - b'A',
            b'a'..=b'z' => c - b'a',
            _ => 0,
        };
        total * 36 + u64::from(value)
    })
}

fn standard(name: &str) -> Option<&[u8]> {
    let bytes = name.as_bytes();
    (bytes.len() == STANDARD_NAME_LENGTH).then_some(bytes)
}

/// Decodes the acquisition time of a standard read name
#[must_use]
pub fn read_time(name: &str) -> Option<ReadTime> {
    let bytes = standard(name)?;
    let mut remainder = base36(&bytes[..6]);
    let mut terms = [0u16; 6];
    for (term, denominator) in terms.iter_mut().zip(TIME_DENOMINATORS) {
        *term = (remainder / denominator) as u16;
        remainder %= denominator;
    }
    terms[5] = remainder as u16;
    Some(ReadTime {
        year: terms[0] + 2000,
        month: terms[1],
        day: terms[2],
        hour: terms[3],
        minute: terms[4],
        second: terms[5],
    })
}

/// Decodes the region number of a standard read name
#[must_use]
pub fn read_region(name: &str) -> Option<u8> {
    let bytes = standard(name)?;
    std::str::from_utf8(&bytes[7..9]).ok()?.parse().ok()
}

/// Decodes the X/Y plate location of a standard read name
#[must_use]
pub fn read_coords(name: &str) -> Option<(u16, u16)> {
    let bytes = standard(name)?;
    let number = base36(&bytes[9..]);
    Some(((number / 4096) as u16, (number % 4096) as u16))
}

/// Name-derived annotations shared by decoded records and index entries
pub trait NamedRead {
    /// The read name
    fn name(&self) -> &str;

    /// Acquisition time, for standard 14 character names
    fn time(&self) -> Option<ReadTime> {
        read_time(self.name())
    }

    /// Run prefix (`R_YYYY_MM_DD_hh_mm_ss_`), for standard 14 character names
    fn run_prefix(&self) -> Option<String> {
        self.time().map(|time| time.run_prefix())
    }

    /// Region number, for standard 14 character names
    fn region(&self) -> Option<u8> {
        read_region(self.name())
    }

    /// X/Y plate location, for standard 14 character names
    fn coords(&self) -> Option<(u16, u16)> {
        read_coords(self.name())
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_time() {
        let time = read_time("E3MFGYR02JWQ7T").unwrap();
        assert_eq!(time.as_array(), [2008, 1, 9, 16, 16, 0]);
        assert_eq!(time.run_prefix(), "R_2008_01_09_16_16_00_");
    }

    #[test]
    fn test_region_and_coords() {
        let expected = [
            ("E3MFGYR02JWQ7T", (3946, 2103)),
            ("E3MFGYR02JA6IL", (3700, 3115)),
            ("E3MFGYR02JHD4H", (3771, 2095)),
            ("E3MFGYR02GFKUC", (2520, 2738)),
            ("E3MFGYR02FR9G7", (2255, 361)),
            ("E3MFGYR02F7Z7G", (2434, 1658)),
        ];
        for (name, coords) in expected {
            assert_eq!(read_region(name), Some(2), "{name}");
            assert_eq!(read_coords(name), Some(coords), "{name}");
        }
    }

    #[test]
    fn test_non_standard_names() {
        assert_eq!(read_time("read_1"), None);
        assert_eq!(read_region("E3MFGYR02JWQ7"), None);
        assert_eq!(read_coords("E3MFGYR02JWQ7TX"), None);
    }
}
