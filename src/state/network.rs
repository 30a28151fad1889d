use crate::state::messages::{NetworkRequest, NetworkResponse};
use log::{debug, error, warn};
use matchday_api::EventKind;
use matchday_api::client::{ApiResult, MatchdayApi};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

const SPINNER_CHARS: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
pub const ERROR_CHAR: char = '!';

#[derive(Debug, Copy, Clone)]
pub struct LoadingState {
    pub is_loading: bool,
    pub spinner_char: char,
}

impl Default for LoadingState {
    fn default() -> Self {
        Self { is_loading: false, spinner_char: ' ' }
    }
}

/// Executes requests against the session store.
///
/// Each request runs on its own task, so responses can come back in any
/// order. Callers tag requests with whatever they need to reconcile that.
pub struct NetworkWorker {
    client: MatchdayApi,
    match_id: String,
    requests: mpsc::Receiver<NetworkRequest>,
    responses: mpsc::Sender<NetworkResponse>,
    in_flight: Arc<AtomicUsize>,
}

impl NetworkWorker {
    pub fn new(
        client: MatchdayApi,
        match_id: String,
        requests: mpsc::Receiver<NetworkRequest>,
        responses: mpsc::Sender<NetworkResponse>,
    ) -> Self {
        Self {
            client,
            match_id,
            requests,
            responses,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub async fn run(mut self) {
        while let Some(request) = self.requests.recv().await {
            if self.in_flight.fetch_add(1, Ordering::SeqCst) == 0 {
                self.start_loading_animation().await;
            }

            let client = self.client.clone();
            let match_id = self.match_id.clone();
            let responses = self.responses.clone();
            let in_flight = self.in_flight.clone();
            tokio::spawn(async move {
                let response = handle_request(&client, &match_id, request).await;
                let is_ok = response_is_ok(&response);

                if responses.send(response).await.is_err() {
                    error!("Failed to send network response: receiver dropped");
                }
                if in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
                    stop_loading_animation(&responses, is_ok).await;
                }
            });
        }
    }

    async fn start_loading_animation(&self) {
        let mut loading_state =
            LoadingState { is_loading: true, spinner_char: SPINNER_CHARS[0] };
        let _ = self
            .responses
            .send(NetworkResponse::LoadingStateChanged { loading_state })
            .await;

        let responses = self.responses.clone();
        let in_flight = self.in_flight.clone();

        tokio::spawn(async move {
            let mut spinner_index = 1;
            let mut interval = tokio::time::interval(Duration::from_millis(33));
            loop {
                interval.tick().await;
                if in_flight.load(Ordering::SeqCst) == 0 {
                    break;
                }
                loading_state.spinner_char = SPINNER_CHARS[spinner_index];
                spinner_index = (spinner_index + 1) % SPINNER_CHARS.len();
                let _ = responses
                    .send(NetworkResponse::LoadingStateChanged { loading_state })
                    .await;
            }
        });
    }
}

async fn stop_loading_animation(responses: &mpsc::Sender<NetworkResponse>, is_ok: bool) {
    tokio::time::sleep(Duration::from_millis(15)).await;

    let spinner_char = if is_ok { ' ' } else { ERROR_CHAR };
    let _ = responses
        .send(NetworkResponse::LoadingStateChanged {
            loading_state: LoadingState { is_loading: false, spinner_char },
        })
        .await;
}

async fn handle_request(
    client: &MatchdayApi,
    match_id: &str,
    request: NetworkRequest,
) -> NetworkResponse {
    match request {
        NetworkRequest::LoadMatch { sequence } => {
            debug!("loading match {match_id} as #{sequence}");
            let result = client.fetch_match(match_id).await;
            NetworkResponse::MatchLoaded { sequence, result }
        }
        NetworkRequest::LoadSquad => NetworkResponse::SquadLoaded {
            result: client.fetch_squad().await,
        },
        NetworkRequest::SubmitTimer { command } => {
            let result = client
                .submit_timer(match_id, command.action, command.submitted_elapsed)
                .await;
            NetworkResponse::TimerResolved { command, result }
        }
        NetworkRequest::RecordTeamEvent { event, player, zone, second } => {
            let result = client
                .record_team_event(match_id, event, &player, zone, second)
                .await;
            NetworkResponse::EventRecorded {
                summary: format!("{} for {player} in zone {}", event.label(), zone.number()),
                result,
            }
        }
        NetworkRequest::RecordOppositionEvent { event } => {
            let result = increment_opposition(client, match_id, event).await;
            NetworkResponse::EventRecorded {
                summary: format!("Opposition {}", event.label()),
                result,
            }
        }
        NetworkRequest::UpdateGoals { pending } => {
            let result = client.update_goals(match_id, pending.side, pending.value).await;
            NetworkResponse::GoalResolved { pending, result }
        }
        NetworkRequest::PullChat => NetworkResponse::ChatPulled {
            result: client.fetch_chat(match_id).await,
        },
        NetworkRequest::SendChat { text } => NetworkResponse::ChatSent {
            result: client.send_chat(match_id, &text).await,
        },
        NetworkRequest::PullSuggestions { ticket } => NetworkResponse::SuggestionsPulled {
            ticket,
            result: client.fetch_live_suggestions(match_id).await,
        },
    }
}

/// Opposition counts are absolute on the server, so this reads the current
/// count and writes count + 1. Two analysts recording the same event at once
/// can lose an increment.
async fn increment_opposition(
    client: &MatchdayApi,
    match_id: &str,
    event: EventKind,
) -> ApiResult<()> {
    let current = client
        .fetch_opposition(match_id)
        .await?
        .into_iter()
        .find(|stat| stat.event == event.key())
        .map(|stat| stat.count)
        .unwrap_or(0);
    let next = current.saturating_add(1);
    debug!("opposition {} {current} -> {next}", event.key());
    client
        .submit_opposition_count(match_id, event, next)
        .await
        .inspect_err(|e| warn!("opposition write failed after reading {current}: {e}"))
}

fn response_is_ok(response: &NetworkResponse) -> bool {
    match response {
        NetworkResponse::LoadingStateChanged { .. } => true,
        NetworkResponse::MatchLoaded { result, .. }
        | NetworkResponse::TimerResolved { result, .. }
        | NetworkResponse::GoalResolved { result, .. } => result.is_ok(),
        NetworkResponse::SquadLoaded { result } => result.is_ok(),
        NetworkResponse::EventRecorded { result, .. } => result.is_ok(),
        NetworkResponse::ChatPulled { result } => result.is_ok(),
        NetworkResponse::ChatSent { result } => result.is_ok(),
        NetworkResponse::SuggestionsPulled { result, .. } => result.is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn worker_api(server: &mockito::Server) -> MatchdayApi {
        MatchdayApi::new(server.url()).with_token(Some("tok".into()))
    }

    #[tokio::test]
    async fn opposition_write_is_previous_count_plus_one() {
        let mut server = mockito::Server::new_async().await;
        let _read = server
            .mock("GET", "/api/matches/7/opposition/")
            .with_status(200)
            .with_body(r#"[{"event": "fouls", "count": 4}, {"event": "blocks", "count": 1}]"#)
            .create_async()
            .await;
        let write = server
            .mock("POST", "/api/matches/7/opposition/")
            .match_body(Matcher::Json(json!({"event": "fouls", "count": 5})))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        increment_opposition(&worker_api(&server), "7", EventKind::Fouls)
            .await
            .unwrap();
        write.assert_async().await;
    }

    #[tokio::test]
    async fn first_opposition_event_writes_one() {
        let mut server = mockito::Server::new_async().await;
        let _read = server
            .mock("GET", "/api/matches/7/opposition/")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        let write = server
            .mock("POST", "/api/matches/7/opposition/")
            .match_body(Matcher::Json(json!({"event": "tackles", "count": 1})))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        increment_opposition(&worker_api(&server), "7", EventKind::Tackles)
            .await
            .unwrap();
        write.assert_async().await;
    }

    #[tokio::test]
    async fn worker_answers_through_the_response_channel() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/chat/messages/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let (req_tx, req_rx) = mpsc::channel(8);
        let (resp_tx, mut resp_rx) = mpsc::channel(64);
        tokio::spawn(NetworkWorker::new(worker_api(&server), "7".into(), req_rx, resp_tx).run());
        req_tx.send(NetworkRequest::PullChat).await.unwrap();

        loop {
            match resp_rx.recv().await.unwrap() {
                NetworkResponse::LoadingStateChanged { .. } => continue,
                NetworkResponse::ChatPulled { result } => {
                    assert!(result.unwrap().is_empty());
                    break;
                }
                other => panic!("unexpected response {other:?}"),
            }
        }
    }
}
