// THEORY:
// The share server lets a visitor's phone pull the painting off the wall. It
// serves a tiny viewer page, runs WebRTC signaling over a websocket, and for
// every peer that opens a `snapshot` data channel:
//
// 1.  registers a `ChannelSink` in the shared `ViewerSet`,
// 2.  pumps whatever lands in that sink into the data channel,
// 3.  sends the latest snapshot once the connection has settled,
// 4.  drops the sink again when the channel closes.
//
// A single fan-out task forwards every snapshot published on the bus to the
// viewer set. Nothing here can stop the render loop: the bus never blocks.

use crate::link::{PeerId, share_url};
use crate::viewers::{ChannelSink, ViewerSet};
use crate::snapshot::SnapshotPacket;
use crate::{ServerConfig, ShareServer, SnapshotBus};
use anyhow::Context;
use axum::extract::Query;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice::udp_network::{EphemeralUDP, UDPNetwork};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_candidate_type::RTCIceCandidateType;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

const SNAPSHOT_LABEL: &str = "snapshot";
const STUN_SERVER: &str = "stun:stun.l.google.com:19302";

const VIEWER_HTML: &str = r#"<!doctype html>
<html>
<head>
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Pose Painter</title>
  <style>
    body { margin: 0; background: #111; color: #aaa; font-family: sans-serif; text-align: center; }
    img { max-width: 100%; margin-top: 12px; }
    #download { display: none; color: #fff; margin: 12px; }
  </style>
</head>
<body>
  <p id="status">connecting...</p>
  <img id="snapshot" alt="">
  <a id="download" download="painting.png">save painting</a>
  <script src="/client.js"></script>
</body>
</html>"#;

const CLIENT_JS: &str = r#"(function(){
    const status = (t)=>{ const el=document.getElementById('status'); if(el) el.textContent=t; };
    const id = new URLSearchParams(location.search).get('id') || '';
    const img = document.getElementById('snapshot');
    const link = document.getElementById('download');
    const pc = new RTCPeerConnection({ iceServers: [{urls:['stun:stun.l.google.com:19302']}] });
    const channel = pc.createDataChannel('snapshot', {ordered:true});
    channel.onopen = ()=> status('waiting for the painting...');
    channel.onclose = ()=> status('disconnected');
    channel.onmessage = (ev)=>{
        try {
            const msg = JSON.parse(ev.data);
            if(!msg.image) return;
            img.src = msg.image;
            link.href = msg.image;
            link.style.display = 'inline-block';
            status('');
        } catch(e) { console.warn(e); }
    };
    const ws = new WebSocket((location.protocol==='https:'?'wss://':'ws://')+location.host+'/ws/signaling?id='+encodeURIComponent(id));
    pc.onicecandidate = (ev)=>{ if(ev.candidate){ ws.send(JSON.stringify({type:'ice', candidate: ev.candidate})); } };
    ws.onmessage = async (ev)=>{
        const msg = JSON.parse(ev.data);
        if(msg.type==='answer'){
            await pc.setRemoteDescription({type:'answer', sdp: msg.sdp});
        } else if(msg.type==='ice'){
            try{ await pc.addIceCandidate(msg.candidate); }catch(e){ console.warn(e); }
        }
    };
    ws.onclose = ()=>{ if(pc.connectionState!=='connected') status('installation not found'); };
    (async ()=>{
        const offer = await pc.createOffer({});
        await pc.setLocalDescription(offer);
        ws.onopen = ()=> ws.send(JSON.stringify({type:'offer', sdp: offer.sdp}));
    })();
})();"#;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum SigMsg {
    #[serde(rename = "offer")]
    Offer { sdp: String },
    #[serde(rename = "answer")]
    Answer { sdp: String },
    #[serde(rename = "ice")]
    Ice { candidate: RTCIceCandidateInit },
}

#[derive(Clone)]
struct ShareState {
    bus: SnapshotBus,
    viewers: Arc<Mutex<ViewerSet>>,
    cfg: ServerConfig,
    peer: PeerId,
}

/// Binds the share server and starts serving viewers in the background.
pub async fn start_server(bus: SnapshotBus, cfg: ServerConfig) -> anyhow::Result<ShareServer> {
    let peer = PeerId::random();
    let link = share_url(&cfg.viewer_base_url(), &peer);
    let state = ShareState {
        bus: bus.clone(),
        viewers: Arc::new(Mutex::new(ViewerSet::new())),
        cfg: cfg.clone(),
        peer: peer.clone(),
    };

    tokio::spawn(fan_out(bus.subscribe(), state.viewers.clone()));

    let share_link = link.clone();
    let app = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/view", get(|| async { Html(VIEWER_HTML) }))
        .route(
            "/client.js",
            get(|| async { ([(header::CONTENT_TYPE, "application/javascript")], CLIENT_JS) }),
        )
        .route(
            "/share",
            get(move || {
                let link = share_link.clone();
                async move { link }
            }),
        )
        .route(
            "/ws/signaling",
            get({
                let state = state.clone();
                move |ws: WebSocketUpgrade, Query(query): Query<HashMap<String, String>>| {
                    let state = state.clone();
                    async move { signaling(ws, query, state) }
                }
            }),
        );

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("binding share server to {}", cfg.bind_addr))?;
    info!(
        bind = %cfg.bind_addr,
        nat_ip = cfg.nat_public_ip.as_deref().unwrap_or("unset"),
        share_url = %link,
        "share server listening"
    );

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            warn!(error = %e, "share server stopped");
        }
    });

    Ok(ShareServer {
        handle,
        peer,
        share_url: link,
    })
}

/// Forwards every published snapshot to the connected viewers.
async fn fan_out(mut rx: broadcast::Receiver<SnapshotPacket>, viewers: Arc<Mutex<ViewerSet>>) {
    loop {
        match rx.recv().await {
            Ok(packet) => match viewers.lock().await.broadcast(&packet).await {
                Ok(report) => debug!(?report, "snapshot broadcast"),
                Err(e) => warn!(error = %e, "snapshot broadcast failed"),
            },
            Err(RecvError::Lagged(skipped)) => debug!(skipped, "fan-out lagged behind the bus"),
            Err(RecvError::Closed) => break,
        }
    }
}

fn signaling(ws: WebSocketUpgrade, query: HashMap<String, String>, state: ShareState) -> Response {
    if query.get("id").map(String::as_str) != Some(state.peer.as_str()) {
        return StatusCode::NOT_FOUND.into_response();
    }
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = ws_conn(socket, state).await {
            warn!(error = %e, "signaling session ended with an error");
        }
    })
}

fn setting_engine(cfg: &ServerConfig) -> anyhow::Result<SettingEngine> {
    let mut se = SettingEngine::default();
    if let Some(ip) = cfg.nat_public_ip.clone() {
        se.set_nat_1to1_ips(vec![ip], RTCIceCandidateType::Host);
    }
    if let Some((start, end)) = cfg.udp_port_range {
        let udp = EphemeralUDP::new(start, end).context("invalid ICE port range")?;
        se.set_udp_network(UDPNetwork::Ephemeral(udp));
    }
    Ok(se)
}

async fn ws_conn(socket: WebSocket, state: ShareState) -> anyhow::Result<()> {
    let api = APIBuilder::new().with_setting_engine(setting_engine(&state.cfg)?).build();
    let config = RTCConfiguration {
        ice_servers: vec![RTCIceServer {
            urls: vec![STUN_SERVER.to_string()],
            ..Default::default()
        }],
        ..Default::default()
    };
    let pc = api.new_peer_connection(config).await?;

    let viewer_state = state.clone();
    pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
        let state = viewer_state.clone();
        Box::pin(async move {
            if dc.label() == SNAPSHOT_LABEL {
                attach_viewer(dc, state).await;
            } else {
                debug!(label = dc.label(), "ignoring unknown data channel");
            }
        })
    }));

    let (ws_tx, mut ws_rx) = socket.split();
    let ws_tx = Arc::new(Mutex::new(ws_tx));

    let ice_tx = ws_tx.clone();
    pc.on_ice_candidate(Box::new(move |cand: Option<RTCIceCandidate>| {
        let ice_tx = ice_tx.clone();
        Box::pin(async move {
            let Some(candidate) = cand.and_then(|c| c.to_json().ok()) else {
                return;
            };
            if let Ok(txt) = serde_json::to_string(&SigMsg::Ice { candidate }) {
                let _ = ice_tx.lock().await.send(Message::Text(txt)).await;
            }
        })
    }));

    while let Some(Ok(msg)) = ws_rx.next().await {
        match msg {
            Message::Text(txt) => match serde_json::from_str::<SigMsg>(&txt) {
                Ok(SigMsg::Offer { sdp }) => {
                    pc.set_remote_description(RTCSessionDescription::offer(sdp)?).await?;
                    let answer = pc.create_answer(None).await?;
                    pc.set_local_description(answer.clone()).await?;
                    let reply = serde_json::to_string(&SigMsg::Answer { sdp: answer.sdp })?;
                    ws_tx.lock().await.send(Message::Text(reply)).await?;
                }
                Ok(SigMsg::Ice { candidate }) => pc.add_ice_candidate(candidate).await?,
                Ok(SigMsg::Answer { .. }) => debug!("unexpected answer from viewer"),
                Err(e) => debug!(error = %e, "unparsable signaling message"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }
    pc.close().await?;
    Ok(())
}

async fn attach_viewer(dc: Arc<RTCDataChannel>, state: ShareState) {
    let viewer = PeerId::random().to_string();
    let (sink, mut rx) = ChannelSink::new(viewer.clone(), 4);
    state.viewers.lock().await.add(Box::new(sink));
    info!(viewer = %viewer, "viewer connected");

    let pump = dc.clone();
    let pump_viewer = viewer.clone();
    tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if let Err(e) = pump.send_text(payload.to_string()).await {
                warn!(viewer = %pump_viewer, error = %e, "data channel send failed");
                break;
            }
        }
    });

    let open_dc = dc.clone();
    let bus = state.bus.clone();
    let settle = state.cfg.settle_delay;
    dc.on_open(Box::new(move || {
        let dc = open_dc.clone();
        let bus = bus.clone();
        Box::pin(async move {
            tokio::time::sleep(settle).await;
            let Some(packet) = bus.latest() else {
                return;
            };
            match packet.payload_json() {
                Ok(json) => {
                    if let Err(e) = dc.send_text(json).await {
                        warn!(error = %e, "initial snapshot send failed");
                    }
                }
                Err(e) => warn!(error = %e, "initial snapshot could not be serialized"),
            }
        })
    }));

    let viewers = state.viewers.clone();
    dc.on_close(Box::new(move || {
        let viewers = viewers.clone();
        let viewer = viewer.clone();
        Box::pin(async move {
            viewers.lock().await.remove(&viewer);
            info!(viewer = %viewer, "viewer disconnected");
        })
    }));
}
