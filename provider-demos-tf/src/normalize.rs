//! demos.tf document normalization

use bridge_traits::RawPayload;
use core_store::{DemoPlayer, DemoRecord, ParseError, PlayerRef, Record, RecordNormalizer, SteamId};
use serde_json::Value;
use tracing::warn;

use crate::types::{DemoDocument, DemoUser};

/// Turns a demos.tf detail document into one [`DemoRecord`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DemosTfNormalizer;

impl DemosTfNormalizer {
    pub fn new() -> Self {
        Self
    }
}

fn user_ref(user: &DemoUser, name: Option<&str>) -> Option<PlayerRef> {
    let steamid = SteamId::parse(&user.steamid)
        .ok()
        .filter(|steamid| steamid.account_id() != 0)?;
    let name = name.filter(|name| !name.is_empty()).unwrap_or(&user.name);
    Some(PlayerRef::new(steamid, name))
}

impl RecordNormalizer for DemosTfNormalizer {
    fn normalize(&self, payload: &RawPayload) -> Result<Vec<Record>, ParseError> {
        let document: DemoDocument = serde_json::from_value(payload.body.clone())?;
        if document.id != payload.id.get() {
            return Err(ParseError::new(format!(
                "document id {} does not match demo {}",
                document.id, payload.id
            )));
        }

        let uploader = match &document.uploader {
            Value::Object(_) => serde_json::from_value::<DemoUser>(document.uploader.clone())
                .ok()
                .and_then(|user| user_ref(&user, None)),
            _ => None,
        };

        let mut players = Vec::with_capacity(document.players.len());
        for entry in &document.players {
            let Some(player) = user_ref(&entry.user, entry.name.as_deref()) else {
                warn!(
                    demoid = document.id,
                    steamid = %entry.user.steamid,
                    "Dropping player with unusable id"
                );
                continue;
            };
            players.push(DemoPlayer {
                player,
                team: entry.team.clone().filter(|team| !team.is_empty()),
                class: entry.class.clone().filter(|class| !class.is_empty()),
                kills: entry.kills,
                assists: entry.assists,
                deaths: entry.deaths,
            });
        }

        let record = DemoRecord {
            demoid: document.id,
            time: document.time,
            duration: document.duration,
            title: document.name,
            map: Some(document.map).filter(|map| !map.is_empty()),
            red_name: document.red,
            blue_name: document.blu,
            red_score: document.red_score,
            blue_score: document.blu_score,
            uploader,
            url: document.url,
            players,
        };

        Ok(vec![record.into()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::ItemId;
    use serde_json::json;

    fn payload(id: u64, body: Value) -> RawPayload {
        RawPayload {
            id: ItemId(id),
            body,
            fetched_at: 1_700_000_000,
        }
    }

    fn demo_record(records: Vec<Record>) -> DemoRecord {
        match records.as_slice() {
            [Record::Demo(demo)] => demo.clone(),
            other => panic!("expected a single demo record, got {:?}", other),
        }
    }

    #[test]
    fn test_normalize_detail_document() {
        let body = json!({
            "id": 501,
            "url": "https://static.demos.example.test/501.dem",
            "name": "match-20200913-1800-cp_process_final.dem",
            "server": "serveme.tf #3",
            "duration": 1790,
            "nick": "SourceTV",
            "time": 1600000501,
            "red": "Froyotech",
            "blu": "Ascent",
            "redScore": 4,
            "bluScore": 5,
            "map": "cp_process_final",
            "uploader": {"id": 2, "steamid": "76561197960265740", "name": "uploader"},
            "players": [
                {
                    "id": 1,
                    "user": {"id": 3, "steamid": "76561197960265741", "name": "profile name"},
                    "name": "in game",
                    "team": "red",
                    "class": "soldier",
                    "kills": 21,
                    "assists": 4,
                    "deaths": 12
                },
                {
                    "id": 2,
                    "user": {"id": 4, "steamid": "76561197960265742", "name": "fallback"},
                    "name": "",
                    "team": "blue",
                    "class": "medic",
                    "kills": 1,
                    "assists": 30,
                    "deaths": 3
                }
            ]
        });

        let demo = demo_record(DemosTfNormalizer::new().normalize(&payload(501, body)).unwrap());

        assert_eq!(demo.demoid, 501);
        assert_eq!(demo.title, "match-20200913-1800-cp_process_final.dem");
        assert_eq!((demo.red_name.as_str(), demo.blue_name.as_str()), ("Froyotech", "Ascent"));
        assert_eq!((demo.red_score, demo.blue_score), (4, 5));
        assert_eq!(demo.uploader.unwrap().steamid, SteamId::from_account_id(12));

        assert_eq!(demo.players.len(), 2);
        assert_eq!(demo.players[0].player.name, "in game");
        assert_eq!(demo.players[0].class.as_deref(), Some("soldier"));
        assert_eq!(demo.players[1].player.name, "fallback");
        assert_eq!(demo.players[1].player.steamid, SteamId::from_account_id(14));
    }

    #[test]
    fn test_listing_shaped_uploader_is_unknown() {
        let body = json!({"id": 9, "time": 1600000009, "uploader": 2});

        let demo = demo_record(DemosTfNormalizer::new().normalize(&payload(9, body)).unwrap());

        assert_eq!(demo.uploader, None);
        assert_eq!(demo.map, None);
        assert!(demo.players.is_empty());
    }

    #[test]
    fn test_players_with_bad_ids_are_dropped() {
        let body = json!({
            "id": 9,
            "time": 1600000009,
            "players": [
                {"user": {"steamid": "not a steamid"}, "kills": 1},
                {"user": {"steamid": "76561197960265729"}, "kills": 2}
            ]
        });

        let demo = demo_record(DemosTfNormalizer::new().normalize(&payload(9, body)).unwrap());

        assert_eq!(demo.players.len(), 1);
        assert_eq!(demo.players[0].kills, 2);
    }

    #[test]
    fn test_mismatched_id_is_parse_error() {
        let body = json!({"id": 10, "time": 1600000010});
        let err = DemosTfNormalizer::new()
            .normalize(&payload(9, body))
            .unwrap_err();
        assert!(err.message.contains("does not match"));
    }

    #[test]
    fn test_missing_time_is_parse_error() {
        let body = json!({"id": 9});
        assert!(DemosTfNormalizer::new().normalize(&payload(9, body)).is_err());
    }
}
