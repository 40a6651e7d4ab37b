//! ETF2L entry normalization
//!
//! Match results carry a mutable score and a `fetched` stamp that the merge
//! pipeline overwrites on every import. Transfers are immutable and keyed by
//! `(teamid, steamid64, time, kind)`.

use bridge_traits::RawPayload;
use core_store::{
    LeagueTeam, MatchRecord, ParseError, PlayerRef, Record, RecordNormalizer, SteamId,
    TransferKind, TransferRecord,
};

use crate::types::{Clan, MatchResult, Transfer};

/// Normalizes entries of the results feed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultNormalizer;

/// Normalizes entries of a team's transfer feed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferNormalizer;

impl From<Clan> for LeagueTeam {
    fn from(clan: Clan) -> Self {
        LeagueTeam {
            teamid: clan.id,
            name: clan.name.filter(|name| !name.is_empty()),
        }
    }
}

impl RecordNormalizer for ResultNormalizer {
    fn normalize(&self, payload: &RawPayload) -> Result<Vec<Record>, ParseError> {
        let result: MatchResult = serde_json::from_value(payload.body.clone())?;

        let record = MatchRecord {
            matchid: result.id,
            time: result.time,
            competition: result
                .competition
                .map(|competition| competition.name)
                .unwrap_or_default(),
            round: result.round.filter(|round| !round.is_empty()),
            team1: result.clan1.into(),
            team2: result.clan2.into(),
            score1: result.r1.unwrap_or(0),
            score2: result.r2.unwrap_or(0),
            forfeit: result.defaultwin,
            fetched: result.fetched,
        };

        Ok(vec![record.into()])
    }
}

impl RecordNormalizer for TransferNormalizer {
    fn normalize(&self, payload: &RawPayload) -> Result<Vec<Record>, ParseError> {
        let transfer: Transfer = serde_json::from_value(payload.body.clone())?;

        let kind: TransferKind = transfer
            .kind
            .parse()
            .map_err(|_| ParseError::new(format!("unknown transfer type '{}'", transfer.kind)))?;
        let steamid = SteamId::parse(&transfer.who.steam.id64)
            .map_err(|e| ParseError::new(e.to_string()))?;

        let record = TransferRecord {
            team: LeagueTeam {
                teamid: transfer.teamid,
                name: None,
            },
            player: PlayerRef::new(steamid, transfer.who.name),
            kind,
            time: transfer.time,
            fetched: transfer.fetched,
        };

        Ok(vec![record.into()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::ItemId;
    use serde_json::{json, Value};

    fn payload(body: Value) -> RawPayload {
        RawPayload {
            id: ItemId(1),
            body,
            fetched_at: 1_700_000_000,
        }
    }

    #[test]
    fn test_normalize_result() {
        let body = json!({
            "id": 70001,
            "clan1": {"id": 10, "name": "Team A", "country": "DE"},
            "clan2": {"id": 11, "name": ""},
            "competition": {"id": 600, "name": "ETF2L Season 40"},
            "division": {"name": "Premiership"},
            "round": "Week 3",
            "time": 1600000000,
            "r1": 5,
            "r2": 0,
            "defaultwin": true,
            "fetched": 1700000000
        });

        let records = ResultNormalizer.normalize(&payload(body)).unwrap();
        let Record::Match(record) = &records[0] else {
            panic!("expected a match record, got {:?}", records);
        };

        assert_eq!(record.matchid, 70001);
        assert_eq!(record.competition, "ETF2L Season 40");
        assert_eq!(record.round.as_deref(), Some("Week 3"));
        assert_eq!(record.team1.name.as_deref(), Some("Team A"));
        assert_eq!(record.team2.name, None);
        assert_eq!((record.score1, record.score2), (5, 0));
        assert!(record.forfeit);
        assert_eq!(record.fetched, 1_700_000_000);
    }

    #[test]
    fn test_unplayed_result_has_zero_scores() {
        let body = json!({
            "id": 70002,
            "clan1": {"id": 10},
            "clan2": {"id": 11},
            "time": null,
            "r1": null,
            "r2": null,
            "fetched": 1700000000
        });

        let records = ResultNormalizer.normalize(&payload(body)).unwrap();
        let Record::Match(record) = &records[0] else {
            panic!("expected a match record, got {:?}", records);
        };

        assert_eq!(record.time, None);
        assert_eq!((record.score1, record.score2), (0, 0));
        assert_eq!(record.competition, "");
    }

    #[test]
    fn test_normalize_transfer() {
        let body = json!({
            "type": "left",
            "time": 1600000500,
            "who": {"id": 5, "name": "roamer", "steam": {"id64": "76561197960265738"}},
            "by": {"id": 6, "name": "leader"},
            "teamid": 42,
            "fetched": 1700000000
        });

        let records = TransferNormalizer.normalize(&payload(body)).unwrap();
        let Record::Transfer(record) = &records[0] else {
            panic!("expected a transfer record, got {:?}", records);
        };

        assert_eq!(record.team.teamid, 42);
        assert_eq!(record.kind, TransferKind::Left);
        assert_eq!(record.player.steamid, SteamId::from_account_id(10));
        assert_eq!(record.player.name, "roamer");
        assert_eq!(
            record.key(),
            (42, SteamId::from_account_id(10), 1_600_000_500, TransferKind::Left)
        );
    }

    #[test]
    fn test_unknown_transfer_type_is_parse_error() {
        let body = json!({
            "type": "kicked",
            "time": 1600000500,
            "who": {"name": "roamer", "steam": {"id64": "76561197960265738"}},
            "teamid": 42,
            "fetched": 1700000000
        });

        let err = TransferNormalizer.normalize(&payload(body)).unwrap_err();
        assert!(err.message.contains("kicked"));
    }

    #[test]
    fn test_result_without_fetched_stamp_is_parse_error() {
        let body = json!({"id": 1, "clan1": {"id": 1}, "clan2": {"id": 2}});
        assert!(ResultNormalizer.normalize(&payload(body)).is_err());
    }
}
