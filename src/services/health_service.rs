use crate::{
    dto::health::{HealthResponse, PlayerStatus},
    state::SharedState,
};

/// Report the session progress.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let controller = state.controller();
    let snapshot = controller.snapshot();
    let players = controller.players().await;
    HealthResponse {
        status: "ok".to_string(),
        phase: snapshot.phase.to_string(),
        version: snapshot.version,
        turn: controller.turn(),
        attached: state.hub().stations(),
        players: players.iter().map(PlayerStatus::from).collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use super::*;
    use crate::{
        bus::{Channel, Dispatcher, InboundEvent},
        config::{AppConfig, GameRules},
        state::AppState,
    };

    #[tokio::test]
    async fn reports_connected_players() {
        let state = AppState::new(AppConfig {
            listen: SocketAddr::from(([127, 0, 0, 1], 0)),
            client_id: "test".into(),
            players: 2,
            win_points: 50,
            debug: false,
            rules: GameRules::default(),
        });
        state
            .controller()
            .dispatch(InboundEvent::new(Channel::Connection.topic(2), ""))
            .await;

        let health = health_status(&state).await;
        assert_eq!(health.phase, "awaiting_players");
        assert_eq!(health.turn, 0);
        assert!(health.attached.is_empty());
        let connected: Vec<bool> = health.players.iter().map(|p| p.connected).collect();
        assert_eq!(connected, vec![false, true]);
    }
}
