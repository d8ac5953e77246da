//! Fetching and parsing a character profile page

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use super::registry::JobKind;
use super::{FieldError, Job, JobContext, JobError, ParseErrors};
use crate::fetch::{FetchRequest, Source};
use crate::store::{Character, Clan, Transaction};

/// Fetch one character by id.
///
/// A character that does not exist is recorded as a tombstone instead, and
/// is never fetched again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchCharacterJob {
    pub id: i64,
    /// Skip the response cache and hit the network
    #[serde(default)]
    pub force: bool,
}

impl JobKind for FetchCharacterJob {
    const TAG: &'static str = "character";
}

impl FetchCharacterJob {
    pub fn new(id: i64) -> Self {
        Self { id, force: false }
    }

    pub fn forced(id: i64) -> Self {
        Self { id, force: true }
    }

    pub fn cache_key(&self) -> String {
        format!("character/{}", self.id)
    }

    pub fn url(&self, base_url: &str) -> String {
        format!("{}character/{}/", base_url, self.id)
    }

    pub async fn run(&self, ctx: &JobContext, tx: &mut Transaction) -> Result<Vec<Job>, JobError> {
        if tx.tombstone_exists(self.id)? {
            debug!(character_id = self.id, "Character is tombstoned, skipping");
            return Ok(Vec::new());
        }

        let url = self.url(&ctx.base_url);
        let key = self.cache_key();
        let request = FetchRequest::get(&url);

        let fetched = tokio::select! {
            _ = ctx.cancel.cancelled() => return Err(JobError::Cancelled),
            result = async {
                if self.force {
                    ctx.fetcher.refresh(&key, &request).await
                } else {
                    ctx.fetcher.fetch(&key, &request).await
                }
            } => result?,
        };

        if ctx.fetcher.cache().is_some() {
            match fetched.source {
                Source::Cache => ctx.metrics.cache_hit(),
                Source::Network => ctx.metrics.cache_miss(),
            }
        }

        let response = fetched.response;
        if response.is_not_found() {
            info!(character_id = self.id, "Character does not exist; creating tombstone");
            if tx.create_tombstone(self.id)? {
                ctx.metrics.tombstone_created();
            }
            return Ok(Vec::new());
        }
        if !response.is_ok() {
            return Err(JobError::UnexpectedStatus {
                url,
                status: response.status,
            });
        }

        let character = parse_character(self.id, &response.text())?;
        if let Some(title) = &character.title {
            tx.get_or_create_title(title)?;
        }
        tx.upsert_character(&character)?;

        info!(
            character_id = self.id,
            first_name = %character.first_name,
            last_name = %character.last_name,
            "Character saved"
        );
        Ok(Vec::new())
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("selector literals are valid CSS")
}

static NAME: LazyLock<Selector> = LazyLock::new(|| selector(".frame__chara__name"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector(".frame__chara__title"));
static BLOCK: LazyLock<Selector> = LazyLock::new(|| selector(".character-block"));
static BLOCK_NAME: LazyLock<Selector> = LazyLock::new(|| selector(".character-block__name"));
static BLOCK_PROFILE: LazyLock<Selector> = LazyLock::new(|| selector(".character-block__profile"));
static BLOCK_BIRTH: LazyLock<Selector> = LazyLock::new(|| selector(".character-block__birth"));

/// Extract a character from a profile page.
///
/// Every section is parsed even when an earlier one fails, so the error
/// lists all problems with the page at once.
pub fn parse_character(id: i64, html: &str) -> Result<Character, ParseErrors> {
    let doc = Html::parse_document(html);
    let mut character = Character::new(id);
    let mut errors = ParseErrors::new();

    let full_name = doc.select(&NAME).next().map(text).unwrap_or_default();
    errors.collect(parse_name(&mut character, &full_name));

    let title = doc.select(&TITLE).next().map(text).unwrap_or_default();
    character.title = non_empty(title);

    for block in doc.select(&BLOCK) {
        let name = block.select(&BLOCK_NAME).next().map(text).unwrap_or_default();
        let profile = all_text(block, &BLOCK_PROFILE);

        match name.as_str() {
            "Race/Clan/Gender" => errors.collect(parse_race_clan_gender(&mut character, &profile)),
            "Nameday" => {
                character.nameday = non_empty(all_text(block, &BLOCK_BIRTH));
                character.guardian = non_empty(profile);
            }
            "City-state" => character.city_state = non_empty(profile),
            "Grand Company" => errors.collect(parse_grand_company(&mut character, &profile)),
            _ => warn!(character_id = id, title = %name, "Unknown block on profile"),
        }
    }

    errors.into_result().map(|_| character)
}

fn parse_name(character: &mut Character, full_name: &str) -> Result<(), FieldError> {
    match full_name.split_once(' ') {
        Some((first, last)) if !first.is_empty() => {
            character.first_name = first.to_string();
            character.last_name = last.to_string();
            Ok(())
        }
        _ => Err(FieldError::new("name", format!("malformed name: \"{}\"", full_name))),
    }
}

// Rendered as "<race><clan> / <gender>", e.g. "Au RaRaen / ♀"
fn parse_race_clan_gender(character: &mut Character, profile: &str) -> Result<(), FieldError> {
    let (race_clan, gender) = profile.split_once('/').ok_or_else(|| {
        FieldError::new("race_clan_gender", "wrong number of items: 1")
    })?;

    let race_clan = race_clan.trim();
    character.gender = non_empty(gender.trim().to_string());

    let clan = Clan::from_profile(race_clan).ok_or_else(|| {
        FieldError::new(
            "race_clan_gender",
            format!("unknown race/clan string: \"{}\"", race_clan),
        )
    })?;
    character.clan = Some(clan);
    character.race = Some(clan.race());
    Ok(())
}

// Rendered as "<company> / <rank>"
fn parse_grand_company(character: &mut Character, profile: &str) -> Result<(), FieldError> {
    let (company, rank) = profile
        .split_once('/')
        .ok_or_else(|| FieldError::new("grand_company", "wrong number of items: 1"))?;

    character.grand_company = non_empty(company.trim().to_string());
    character.grand_company_rank = non_empty(rank.trim().to_string());
    Ok(())
}

fn text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn all_text(scope: ElementRef<'_>, selector: &Selector) -> String {
    scope
        .select(selector)
        .flat_map(|e| e.text())
        .collect::<String>()
        .trim()
        .to_string()
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}
