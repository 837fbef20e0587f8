//! Headless roomsync peer
//!
//! Connects to a relay server and plays a scripted session: walks a circle,
//! locks the room, grabs a ball, carries it and throws it. Remote players
//! seen in snapshots are logged once per second.
//!
//! ```text
//! cargo run -p headless_peer -- demos/headless_peer/config/peer.ron
//! RUST_LOG=roomsync_netcode=trace cargo run -p headless_peer
//! ```

use glam::Vec3;
use roomsync_core::{Config, DevicePose, FloorPlane, ItemId, ItemRecord, ItemRegistry};
use roomsync_netcode::{FrameInput, SessionPhase, SyncContext, WsConnector};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const FRAME_DT: f32 = 1.0 / 60.0;
const WALK_RADIUS: f32 = 1.0;
const EYE_HEIGHT: f32 = 1.6;
const GRAVITY: f32 = -9.81;
const RECONNECT_SECS: f32 = 3.0;

/// Scripted moments of the session, in seconds
const LOCK_AT: f32 = 1.5;
const GRAB_AT: f32 = 4.0;
const THROW_AT: f32 = 6.0;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,roomsync_netcode=debug")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!(%path, "loading configuration");
            Config::load(&path)?
        }
        None => Config::default(),
    };

    let mut ctx = SyncContext::from_config(&config, Box::new(WsConnector::current()?))?;
    let ball = ItemId::new("ball");
    ctx.items_mut()
        .register(ItemRecord::new(ball.clone(), Vec3::new(0.5, 1.0, 0.0)));
    ctx.connect();

    let mut interval = tokio::time::interval(Duration::from_secs_f32(FRAME_DT));
    let mut clock = 0.0f32;
    let mut since_reconnect = 0.0f32;
    let mut since_report = 0.0f32;
    let mut thrown = false;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut shutdown => {
                info!("shutting down");
                break;
            }
        }
        clock += FRAME_DT;

        let frame = walk(clock);

        if clock >= LOCK_AT && !ctx.calibrator().is_locked() {
            if let Some(outcome) = ctx.confirm_room(&frame.device, &[FloorPlane::horizontal(0.0)]) {
                info!(epoch = outcome.anchor.epoch(), source = ?outcome.floor_source, "room fixed");
            }
        }

        if clock >= GRAB_AT && clock < THROW_AT {
            carry(&mut ctx, &ball, &frame);
        } else if clock >= THROW_AT && !thrown {
            thrown = true;
            if let Err(e) = ctx.release(&ball, Vec3::new(1.5, 2.0, 0.0)) {
                warn!(error = %e, "throw failed");
            }
        }
        simulate_ball(&mut ctx, &ball);

        ctx.tick(FRAME_DT, &frame);

        if ctx.session().phase() == SessionPhase::Disconnected {
            since_reconnect += FRAME_DT;
            if since_reconnect >= RECONNECT_SECS {
                since_reconnect = 0.0;
                ctx.connect();
            }
        }

        since_report += FRAME_DT;
        if since_report >= 1.0 {
            since_report = 0.0;
            report(&ctx);
        }
    }

    ctx.session_mut().disconnect();
    Ok(())
}

/// Device pose on a circle around the world origin, facing along the path
fn walk(clock: f32) -> FrameInput {
    let angle = clock * 0.5;
    let position = Vec3::new(
        WALK_RADIUS * angle.cos(),
        EYE_HEIGHT,
        WALK_RADIUS * angle.sin(),
    );
    let yaw_deg = angle.to_degrees() + 90.0;
    let hand = position + Vec3::new(0.0, -0.4, 0.0);
    FrameInput::new(DevicePose::new(position, yaw_deg)).with_hand(hand)
}

fn carry(ctx: &mut SyncContext, ball: &ItemId, frame: &FrameInput) {
    if ctx.engine().arbiter().held_item() != Some(ball) {
        if let Err(e) = ctx.grab(ball) {
            warn!(error = %e, "grab failed");
            return;
        }
        info!(item = %ball, "grabbed");
    }
    if let (Some(hand), Some(record)) = (frame.hand, ctx.items_mut().lookup_mut(ball)) {
        record.set_held_pose(hand);
    }
}

/// Ballistic flight with a damped bounce on the floor
fn simulate_ball(ctx: &mut SyncContext, ball: &ItemId) {
    let Some(record) = ctx.items_mut().lookup_mut(ball) else {
        return;
    };
    if !record.physics_driven() {
        return;
    }
    let mut velocity = record.velocity() + Vec3::new(0.0, GRAVITY * FRAME_DT, 0.0);
    let mut position = record.position() + velocity * FRAME_DT;
    if position.y < 0.1 {
        position.y = 0.1;
        velocity.y = -velocity.y * 0.4;
        velocity.x *= 0.8;
        velocity.z *= 0.8;
        if velocity.length_squared() < 1e-3 {
            velocity = Vec3::ZERO;
        }
    }
    record.set_physics_state(position, velocity);
}

fn report(ctx: &SyncContext) {
    let agents = ctx.engine().agents();
    info!(
        phase = ?ctx.session().phase(),
        calibrated = ctx.engine().transformer().is_calibrated(),
        remote_players = agents.len(),
        "status"
    );
    for agent in agents.values() {
        let p = agent.position();
        info!(
            player = %agent.id(),
            x = p.x,
            z = p.z,
            yaw_deg = agent.yaw_deg(),
            "remote player"
        );
    }
}
