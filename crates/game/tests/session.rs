use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use glam::Vec2;

use chase::net::{FireOrder, ShipSnapshot};
use chase::{
    CloseReason, Entity, EntityHandle, Envelope, GameConfig, GameConnection, GameDevice,
    GameEvent, LoopbackConnection, Message, Outcome, PROTOCOL_VERSION, ReactorPower,
    RejectReason, SessionEvent, SessionNegotiator, SessionState, ShipRole, Simulation,
    TickReport,
};

struct Link {
    host: Arc<dyn GameConnection>,
    host_device: GameDevice,
    guest: Arc<dyn GameConnection>,
    guest_device: GameDevice,
}

fn link() -> Link {
    let (host, guest) = LoopbackConnection::pair();
    let host_device = host.device();
    let guest_device = guest.device();
    Link {
        host: Arc::new(host),
        host_device,
        guest: Arc::new(guest),
        guest_device,
    }
}

fn config(match_duration_secs: i32, notice_ticks: u32) -> GameConfig {
    GameConfig {
        match_duration_secs,
        notice_ticks,
        ..GameConfig::default()
    }
}

fn simulations(link: &Link, config: GameConfig) -> (Simulation, Simulation) {
    let host = Simulation::new(link.host.clone(), Some(link.guest_device), config.clone());
    let guest = Simulation::new(link.guest.clone(), Some(link.host_device), config);
    (host, guest)
}

fn match_over(report: &TickReport) -> Option<Outcome> {
    report.events.iter().find_map(|event| match event {
        GameEvent::MatchOver { outcome, .. } => Some(*outcome),
        _ => None,
    })
}

fn one_cat_one_mouse(sim: &Simulation) -> bool {
    let roles = [sim.local_role(), sim.remote_role()];
    roles.contains(&ShipRole::Cat) && roles.contains(&ShipRole::Mouse)
}

#[test]
fn test_negotiation_over_loopback() {
    let link = link();
    let (host_session, host_events) = SessionNegotiator::attach(&link.host, PROTOCOL_VERSION);
    let (guest_session, guest_events) = SessionNegotiator::attach(&link.guest, PROTOCOL_VERSION);

    assert_eq!(
        host_events.try_recv().ok(),
        Some(SessionEvent::Started(link.guest_device))
    );
    assert_eq!(
        guest_events.try_recv().ok(),
        Some(SessionEvent::Started(link.host_device))
    );
    assert_eq!(host_session.other_player(), Some(link.guest_device));
    assert_eq!(guest_session.other_player(), Some(link.host_device));

    guest_session.quit();
    assert_eq!(
        host_events.try_recv().ok(),
        Some(SessionEvent::Closed(CloseReason::PeerQuit))
    );
    assert_eq!(host_session.session().state(), SessionState::Closed);
}

#[test]
fn test_version_mismatch_rejects_guest() {
    let link = link();
    let (host_session, host_events) = SessionNegotiator::attach(&link.host, PROTOCOL_VERSION);
    let (guest_session, guest_events) =
        SessionNegotiator::attach(&link.guest, PROTOCOL_VERSION - 1);

    assert!(matches!(
        host_events.try_recv().ok(),
        Some(SessionEvent::Refused {
            reason: RejectReason::VersionMismatch,
            ..
        })
    ));
    assert_eq!(
        guest_events.try_recv().ok(),
        Some(SessionEvent::Rejected(RejectReason::VersionMismatch))
    );
    assert_eq!(host_session.other_player(), None);
    assert_eq!(
        guest_session.session().state(),
        SessionState::Rejected(RejectReason::VersionMismatch)
    );
}

#[test]
fn test_initial_roles_mirror() {
    let link = link();
    let (host, guest) = simulations(&link, config(60, 3));

    assert_eq!(host.local_role(), ShipRole::Mouse);
    assert_eq!(host.remote_role(), ShipRole::Cat);
    assert_eq!(guest.local_role(), ShipRole::Cat);
    assert_eq!(guest.remote_role(), ShipRole::Mouse);

    let host_body = host.local_body().unwrap();
    assert_eq!(host_body.position, Vec2::new(-400.0, 0.0));
    let mirrored = guest.remote_body().unwrap();
    assert_eq!(mirrored.position, Vec2::new(-400.0, 0.0));
    assert!((mirrored.rotation() - FRAC_PI_2).abs() < 1e-6);
}

#[test]
fn test_snapshot_blends_remote_ship() {
    let link = link();
    let mut host = Simulation::new(link.host.clone(), Some(link.guest_device), config(60, 3));

    host.tick(0);
    link.guest.send(Envelope::new(
        link.host_device,
        Message::ShipSnapshot(ShipSnapshot {
            position: Vec2::new(100.0, -50.0),
            rotation: 1.5708,
            velocity: Vec2::new(0.5, 0.0),
            reactor: ReactorPower::On,
        }),
    ));
    let report = host.tick(16);
    assert_eq!(report.inbound, 1);

    let remote = host.remote_body().unwrap();
    assert!((remote.position.x - 5.0).abs() < 1e-4);
    assert!((remote.position.y + 2.5).abs() < 1e-4);
    assert!((remote.rotation() - FRAC_PI_2).abs() < 1e-4);
    assert_eq!(remote.velocity, Vec2::new(0.5, 0.0));
    assert_eq!(host.remote_ship().unwrap().reactor(), ReactorPower::On);
}

#[test]
fn test_foreign_device_ignored() {
    let link = link();
    let stranger = GameDevice::new("127.0.0.1:9".parse().unwrap());
    let mut host = Simulation::new(link.host.clone(), Some(stranger), config(60, 3));

    host.tick(0);
    link.guest.send(Envelope::new(
        link.host_device,
        Message::ShipSnapshot(ShipSnapshot {
            position: Vec2::new(100.0, -50.0),
            rotation: 1.0,
            velocity: Vec2::ZERO,
            reactor: ReactorPower::On,
        }),
    ));
    host.tick(16);

    assert_eq!(host.remote_body().unwrap().position, Vec2::ZERO);
    assert_eq!(host.remote_ship().unwrap().reactor(), ReactorPower::Off);
}

#[test]
fn test_chrono_reaches_zero_once() {
    let link = link();
    let (mut host, mut guest) = simulations(&link, config(1, 0));

    let mut host_outcomes = Vec::new();
    let mut guest_outcomes = Vec::new();
    for now in [0, 500, 1000, 1016, 2000, 3000] {
        host_outcomes.extend(match_over(&host.tick(now)));
        guest_outcomes.extend(match_over(&guest.tick(now + 8)));
    }

    assert_eq!(host_outcomes.len(), 1);
    assert_eq!(guest_outcomes.len(), 1);
    let mirrored = match host_outcomes[0] {
        Outcome::Win => Outcome::Lose,
        Outcome::Lose => Outcome::Win,
        Outcome::Draw => Outcome::Draw,
    };
    assert_eq!(guest_outcomes[0], mirrored);

    assert_eq!(host.arbiter().chrono(), 0);
    assert_eq!(guest.arbiter().chrono(), 0);
    assert!(host.arbiter().is_match_over());
    assert!(guest.arbiter().is_match_over());
    assert!(!guest.fire());
}

#[test]
fn test_restart_inverts_roles_on_both_peers() {
    let link = link();
    let (mut host, mut guest) = simulations(&link, config(1, 0));
    for now in [0, 1000, 1016] {
        host.tick(now);
        guest.tick(now);
    }
    assert!(host.arbiter().is_match_over());
    assert!(guest.arbiter().is_match_over());

    guest.request_restart();
    let guest_report = guest.tick(1032);
    let host_report = host.tick(1032);

    assert!(guest_report.events.contains(&GameEvent::Restarted));
    assert!(host_report.events.contains(&GameEvent::Restarted));
    for sim in [&host, &guest] {
        assert!(!sim.arbiter().is_match_over());
        assert_eq!(sim.arbiter().chrono(), 1);
        assert!(one_cat_one_mouse(sim));
    }
    assert_eq!(host.local_role(), ShipRole::Cat);
    assert_eq!(guest.local_role(), ShipRole::Mouse);
}

#[test]
fn test_kill_neutralizes_then_inverts() {
    let link = link();
    let (mut host, mut guest) = simulations(&link, config(60, 3));
    host.tick(0);
    guest.tick(0);

    link.guest.send(Envelope::new(
        link.host_device,
        Message::Fire(FireOrder {
            position: Vec2::new(-400.0, 0.0),
            rotation: 0.0,
        }),
    ));
    host.tick(16);
    assert_eq!(host.registry().killers().len(), 2);

    let report = host.tick(32);
    assert!(
        report
            .events
            .contains(&GameEvent::ShipDestroyed { local: true })
    );
    assert!(host.explosion_in_progress());
    assert_eq!(host.local_role(), ShipRole::MouseNeutral);
    assert_eq!(host.remote_role(), ShipRole::CatNeutral);

    let report = guest.tick(48);
    assert!(
        report
            .events
            .contains(&GameEvent::ShipDestroyed { local: false })
    );
    assert_eq!(guest.local_role(), ShipRole::CatNeutral);

    let host_report = host.tick(2100);
    let guest_report = guest.tick(2100);
    assert!(host_report.events.contains(&GameEvent::RolesInverted {
        local: ShipRole::Cat,
        remote: ShipRole::Mouse
    }));
    assert!(guest_report.events.contains(&GameEvent::RolesInverted {
        local: ShipRole::Mouse,
        remote: ShipRole::Cat
    }));
    assert!(host.registry().killers().is_empty());
    assert!(!host.explosion_in_progress());
    assert!(host.local_body().unwrap().visible);
    assert_eq!(host.arbiter().notice(), 3);
}

#[test]
fn test_draw_hook_sees_every_entity() {
    let link = link();
    let (mut host, _guest) = simulations(&link, config(60, 3));
    let drawn = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&drawn);
    host.set_draw_hook(Box::new(move |_: EntityHandle, _: &Entity, _: u64| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    host.tick(0);
    assert_eq!(drawn.load(Ordering::SeqCst), host.registry().len());
}

#[test]
fn test_boost_needs_a_mouse() {
    let link = link();
    let (mut host, mut guest) = simulations(&link, config(60, 3));
    host.tick(0);
    guest.tick(0);

    assert!(host.boost());
    assert!(!guest.boost());
}

#[test]
fn test_shutdown_stops_listening() {
    let link = link();
    let (mut host, _guest) = simulations(&link, config(60, 3));
    host.tick(0);

    host.shutdown();
    host.shutdown();
    assert!(host.registry().is_empty());

    link.guest.send(Envelope::new(link.host_device, Message::Killed));
    assert_eq!(host.tick(16).inbound, 0);
}

#[test]
fn test_session_still_hears_quit_after_shutdown() {
    let link = link();
    let (host_session, host_events) = SessionNegotiator::attach(&link.host, PROTOCOL_VERSION);
    let (guest_session, _guest_events) = SessionNegotiator::attach(&link.guest, PROTOCOL_VERSION);
    assert!(matches!(host_events.try_recv(), Ok(SessionEvent::Started(_))));

    let mut host = Simulation::new(link.host.clone(), host_session.other_player(), config(60, 3));
    host.tick(0);
    host.shutdown();

    guest_session.quit();
    assert_eq!(
        host_events.try_recv().ok(),
        Some(SessionEvent::Closed(CloseReason::PeerQuit))
    );
    assert_eq!(host_session.session().state(), SessionState::Closed);
}
