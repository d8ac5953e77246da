use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// A player character parsed from a profile page.
///
/// Identity is `id`; writes are upserts keyed by it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: i64,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,

    pub first_name: String,
    pub last_name: String,
    /// Text of the character's title; the title itself lives in the titles partition
    pub title: Option<String>,
    pub race: Option<Race>,
    pub clan: Option<Clan>,
    pub gender: Option<String>,
    pub nameday: Option<String>,
    pub guardian: Option<String>,
    pub city_state: Option<String>,
    pub grand_company: Option<String>,
    pub grand_company_rank: Option<String>,
}

impl Character {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

/// Marks a character id that does not exist, so it is never fetched again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterTombstone {
    pub id: i64,
    pub created_at: String,
}

/// A character title, e.g. "Khloe's Friend" or "The Final Witness".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterTitle {
    pub title: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Race {
    Hyur,
    Elezen,
    Lalafell,
    Miqote,
    Roegadyn,
    AuRa,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Clan {
    Midlander,
    Highlander,
    Wildwood,
    Duskwight,
    Plainsfolk,
    Dunesfolk,
    SunSeeker,
    MoonKeeper,
    SeaWolf,
    Hellsguard,
    Raen,
    Xaela,
}

impl Clan {
    pub fn race(&self) -> Race {
        match self {
            Clan::Midlander | Clan::Highlander => Race::Hyur,
            Clan::Wildwood | Clan::Duskwight => Race::Elezen,
            Clan::Plainsfolk | Clan::Dunesfolk => Race::Lalafell,
            Clan::SunSeeker | Clan::MoonKeeper => Race::Miqote,
            Clan::SeaWolf | Clan::Hellsguard => Race::Roegadyn,
            Clan::Raen | Clan::Xaela => Race::AuRa,
        }
    }

    /// Profile pages render race and clan back to back, e.g. `HyurMidlander`.
    pub fn from_profile(race_clan: &str) -> Option<Self> {
        let clan = match race_clan {
            "HyurMidlander" => Clan::Midlander,
            "HyurHighlander" => Clan::Highlander,
            "ElezenWildwood" => Clan::Wildwood,
            "ElezenDuskwight" => Clan::Duskwight,
            "LalafellPlainsfolk" => Clan::Plainsfolk,
            "LalafellDunesfolk" => Clan::Dunesfolk,
            "Miqo'teSeeker of the Sun" => Clan::SunSeeker,
            "Miqo'teKeeper of the Moon" => Clan::MoonKeeper,
            "RoegadynSea Wolf" => Clan::SeaWolf,
            "RoegadynHellsguard" => Clan::Hellsguard,
            "Au RaRaen" => Clan::Raen,
            "Au RaXaela" => Clan::Xaela,
            _ => return None,
        };
        Some(clan)
    }
}

pub(crate) fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}
