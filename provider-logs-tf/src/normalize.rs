//! v3 log document normalization

use bridge_traits::RawPayload;
use core_store::{LogPlayer, LogRecord, ParseError, PlayerRef, Record, RecordNormalizer, SteamId};
use serde_json::Value;
use tracing::warn;

use crate::types::{LogDocument, Uploader};

/// Turns a logs.tf v3 document into one [`LogRecord`].
///
/// Players whose id cannot be parsed are dropped from the record. An uploader
/// without a usable id is recorded as unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogsTfNormalizer;

impl LogsTfNormalizer {
    pub fn new() -> Self {
        Self
    }
}

fn uploader_ref(uploader: &Uploader) -> Option<PlayerRef> {
    let steamid = match &uploader.id {
        Value::String(s) => SteamId::parse(s).ok(),
        Value::Number(n) => n.as_u64().and_then(|id| SteamId::from_u64(id).ok()),
        _ => None,
    }
    .filter(|steamid| steamid.account_id() != 0)?;
    Some(PlayerRef::new(steamid, uploader.name.clone()))
}

impl RecordNormalizer for LogsTfNormalizer {
    fn normalize(&self, payload: &RawPayload) -> Result<Vec<Record>, ParseError> {
        if !payload.body.get("info").is_some_and(Value::is_object) {
            return Err(ParseError::missing("info"));
        }
        let document: LogDocument = serde_json::from_value(payload.body.clone())?;
        let logid = payload.id.get();

        let mut players = Vec::with_capacity(document.players.len());
        for (key, stats) in &document.players {
            let steamid = match SteamId::parse(key) {
                Ok(steamid) if steamid.account_id() != 0 => steamid,
                Ok(_) => {
                    warn!(logid, player = %key, "Dropping player with account id 0");
                    continue;
                }
                Err(e) => {
                    warn!(logid, player = %key, error = %e, "Dropping player with unusable id");
                    continue;
                }
            };
            let name = document.names.get(key).cloned().unwrap_or_default();
            players.push(LogPlayer {
                player: PlayerRef::new(steamid, name),
                team: stats.team.clone().filter(|team| !team.is_empty()),
                kills: stats.kills,
                deaths: stats.deaths,
                assists: stats.assists,
                damage: stats.dmg,
            });
        }

        let info = document.info;
        let record = LogRecord {
            logid,
            time: info.date,
            duration: info.total_length,
            title: info.title,
            map: Some(info.map).filter(|map| !map.is_empty()),
            red_score: document.teams.red.score,
            blue_score: document.teams.blue.score,
            uploader: info.uploader.as_ref().and_then(uploader_ref),
            players,
        };

        Ok(vec![record.into()])
    }
}
