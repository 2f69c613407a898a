use super::*;
use crate::testutil::{
    mac, session_with, session_with_forwarding, TableResolver, GATEWAY_MAC, OWN_MAC,
};
use netspoof_core::Forwarding;
use std::net::Ipv4Addr;

fn m(last: u8) -> MacAddr {
    mac(0x02, 0, 0, 0, 0, last)
}

fn ip4(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

fn lan() -> TableResolver {
    TableResolver::new(&[
        ("10.0.0.5", m(5)),
        ("10.0.0.6", m(6)),
        ("10.0.0.7", m(7)),
    ])
}

fn spoofer(session: &Arc<Session>) -> ArpSpoofer {
    ArpSpoofer::new(Arc::clone(session)).with_period(Duration::from_millis(10))
}

#[tokio::test]
async fn test_one_tick_skips_whitelisted_target() {
    let (session, sender, _) = session_with(lan());
    let module = spoofer(&session);
    session.params.set(PARAM_TARGETS, "10.0.0.5,10.0.0.6").unwrap();
    session.params.set(PARAM_WHITELIST, "10.0.0.6").unwrap();
    module.configure().await.unwrap();

    module
        .beacon()
        .spoof_targets(session.gateway.ip, OWN_MAC, SpoofMode::Spoofing, None)
        .await;

    let replies = sender.arp_replies();
    assert_eq!(replies.len(), 1);
    let (eth_dst, arp) = &replies[0];
    assert_eq!(*eth_dst, m(5));
    assert!(arp.is_reply());
    assert_eq!(arp.sender_proto_addr, ip4("10.0.0.1"));
    assert_eq!(arp.sender_hw_addr, OWN_MAC);
    assert_eq!(arp.target_proto_addr, ip4("10.0.0.5"));
    assert_eq!(arp.target_hw_addr, m(5));
}

#[tokio::test]
async fn test_whitelist_matches_across_forms() {
    let (session, sender, _) = session_with(lan());
    let module = spoofer(&session);

    // target given by IP, whitelisted by MAC
    session.params.set(PARAM_TARGETS, "10.0.0.5,10.0.0.6").unwrap();
    session.params.set(PARAM_WHITELIST, &m(6).to_string()).unwrap();
    module.configure().await.unwrap();
    module
        .beacon()
        .spoof_targets(session.gateway.ip, OWN_MAC, SpoofMode::Spoofing, None)
        .await;
    let targets: Vec<Ipv4Addr> = sender
        .arp_replies()
        .iter()
        .map(|(_, arp)| arp.target_proto_addr)
        .collect();
    assert_eq!(targets, vec![ip4("10.0.0.5")]);

    // target given by MAC, whitelisted by IP
    sender.clear();
    session
        .params
        .set(PARAM_TARGETS, &format!("{},{}", m(5), m(7)))
        .unwrap();
    session.params.set(PARAM_WHITELIST, "10.0.0.7").unwrap();
    module.configure().await.unwrap();
    module
        .beacon()
        .spoof_targets(session.gateway.ip, OWN_MAC, SpoofMode::Spoofing, None)
        .await;
    let targets: Vec<Ipv4Addr> = sender
        .arp_replies()
        .iter()
        .map(|(_, arp)| arp.target_proto_addr)
        .collect();
    assert_eq!(targets, vec![ip4("10.0.0.5")]);
}

#[tokio::test]
async fn test_sender_is_never_told_about_itself() {
    let (session, sender, _) = session_with(lan());
    let module = spoofer(&session);
    session.params.set(PARAM_TARGETS, "10.0.0.5,10.0.0.6").unwrap();
    module.configure().await.unwrap();

    module
        .beacon()
        .spoof_targets("10.0.0.5".parse().unwrap(), OWN_MAC, SpoofMode::Spoofing, None)
        .await;

    let replies = sender.arp_replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].1.target_proto_addr, ip4("10.0.0.6"));
    assert_eq!(replies[0].1.sender_proto_addr, ip4("10.0.0.5"));
}

#[tokio::test]
async fn test_full_duplex_is_reversible() {
    let (session, sender, _) = session_with(lan());
    let module = spoofer(&session);
    session.params.set(PARAM_TARGETS, "10.0.0.5").unwrap();
    session.params.set(PARAM_FULLDUPLEX, "true").unwrap();
    module.configure().await.unwrap();
    let beacon = module.beacon();

    let to_gateway = |replies: Vec<(MacAddr, netspoof_packet::ArpPacket)>| {
        replies
            .into_iter()
            .filter(|(dst, _)| *dst == GATEWAY_MAC)
            .map(|(_, arp)| arp)
            .collect::<Vec<_>>()
    };

    beacon
        .spoof_targets(session.gateway.ip, OWN_MAC, SpoofMode::Spoofing, None)
        .await;
    let lie = to_gateway(sender.arp_replies());
    assert_eq!(lie.len(), 1);
    assert_eq!(lie[0].sender_proto_addr, ip4("10.0.0.5"));
    assert_eq!(lie[0].sender_hw_addr, OWN_MAC);
    assert_eq!(lie[0].target_proto_addr, ip4("10.0.0.1"));

    sender.clear();
    beacon
        .spoof_targets(
            session.gateway.ip,
            session.gateway.mac,
            SpoofMode::Restoring,
            None,
        )
        .await;
    let truth = to_gateway(sender.arp_replies());
    assert_eq!(truth.len(), 1);
    assert_eq!(truth[0].sender_proto_addr, ip4("10.0.0.5"));

    let real = session
        .resolver
        .inverse_resolve(truth[0].sender_hw_addr)
        .await
        .unwrap();
    assert_eq!(real, "10.0.0.5".parse::<IpAddr>().unwrap());

    // the target itself got the gateway's real MAC back
    let to_target: Vec<_> = sender
        .arp_replies()
        .into_iter()
        .filter(|(dst, _)| *dst == m(5))
        .collect();
    assert_eq!(to_target.len(), 1);
    assert_eq!(to_target[0].1.sender_hw_addr, GATEWAY_MAC);
}

#[tokio::test]
async fn test_no_gateway_reply_without_full_duplex() {
    let (session, sender, _) = session_with(lan());
    let module = spoofer(&session);
    session.params.set(PARAM_TARGETS, "10.0.0.5").unwrap();
    module.configure().await.unwrap();

    module
        .beacon()
        .spoof_targets(session.gateway.ip, OWN_MAC, SpoofMode::Spoofing, None)
        .await;

    assert!(sender
        .arp_replies()
        .iter()
        .all(|(dst, _)| *dst != GATEWAY_MAC));
}

#[tokio::test]
async fn test_forwarding_enabled_in_plain_mode() {
    let (session, _, forwarding) = session_with_forwarding(lan(), false);
    let module = spoofer(&session);
    session.params.set(PARAM_TARGETS, "10.0.0.5").unwrap();

    module.handle("arp.spoof on").await.unwrap();
    assert!(forwarding.is_forwarding_enabled());
    assert!(!module.is_ban());

    module.handle("arp.spoof off").await.unwrap();
}

#[tokio::test]
async fn test_ban_disables_forwarding_and_resets_on_stop() {
    let (session, _, forwarding) = session_with_forwarding(lan(), true);
    let module = spoofer(&session);
    session.params.set(PARAM_TARGETS, "10.0.0.5").unwrap();

    module.handle("arp.ban on").await.unwrap();
    assert!(module.running());
    assert!(module.is_ban());
    assert!(!forwarding.is_forwarding_enabled());

    module.handle("arp.ban off").await.unwrap();
    assert!(!module.running());
    assert!(!module.is_ban());

    // a later plain start does not inherit ban semantics
    module.handle("arp.spoof on").await.unwrap();
    assert!(forwarding.is_forwarding_enabled());
    module.stop().await.unwrap();
}

#[tokio::test]
async fn test_ban_on_while_running_keeps_state() {
    let (session, _, forwarding) = session_with_forwarding(lan(), false);
    let module = spoofer(&session);
    session.params.set(PARAM_TARGETS, "10.0.0.5").unwrap();

    module.start().await.unwrap();
    let err = module.handle("arp.ban on").await.unwrap_err();
    assert!(matches!(err, Error::AlreadyStarted(_)));
    assert!(!module.is_ban());
    assert!(forwarding.is_forwarding_enabled());

    module.stop().await.unwrap();
}

#[tokio::test]
async fn test_idempotent_start_stop() {
    let (session, _, _) = session_with(lan());
    let module = spoofer(&session);
    session.params.set(PARAM_TARGETS, "10.0.0.5").unwrap();

    let err = module.stop().await.unwrap_err();
    assert!(matches!(err, Error::AlreadyStopped(_)));

    module.start().await.unwrap();
    let err = module.start().await.unwrap_err();
    assert!(matches!(err, Error::AlreadyStarted(_)));
    assert!(module.running());

    let err = module.configure().await.unwrap_err();
    assert!(matches!(err, Error::AlreadyStarted(_)));

    module.stop().await.unwrap();
    let err = module.stop().await.unwrap_err();
    assert!(err.is_idempotency());
}

#[tokio::test]
async fn test_stop_restores_targets() {
    let (session, sender, _) = session_with(lan());
    let module = spoofer(&session);
    session.params.set(PARAM_TARGETS, "10.0.0.5").unwrap();

    module.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!sender.arp_replies().is_empty());

    module.stop().await.unwrap();
    let (dst, last) = sender.arp_replies().pop().unwrap();
    assert_eq!(dst, m(5));
    assert_eq!(last.sender_proto_addr, ip4("10.0.0.1"));
    assert_eq!(last.sender_hw_addr, GATEWAY_MAC);
}

#[tokio::test]
async fn test_skip_restore_is_read_at_stop() {
    let (session, sender, _) = session_with(lan());
    let module = spoofer(&session);
    session.params.set(PARAM_TARGETS, "10.0.0.5").unwrap();

    module.start().await.unwrap();
    session.params.set(PARAM_SKIP_RESTORE, "true").unwrap();
    module.stop().await.unwrap();

    assert!(sender
        .arp_replies()
        .iter()
        .all(|(_, arp)| arp.sender_hw_addr != GATEWAY_MAC));
}

#[tokio::test]
async fn test_empty_targets_start_is_a_noop() {
    let (session, sender, _) = session_with(lan());
    let module = spoofer(&session);
    session.params.set(PARAM_TARGETS, "").unwrap();

    module.start().await.unwrap();
    assert!(module.running());
    tokio::time::sleep(Duration::from_millis(30)).await;
    module.stop().await.unwrap();

    assert!(sender.frames().is_empty());
}

#[tokio::test]
async fn test_bad_target_expression_keeps_module_idle() {
    let (session, _, _) = session_with(lan());
    let module = spoofer(&session);
    session.params.set(PARAM_TARGETS, "10.0.0.5,nosuchalias").unwrap();

    let err = module.start().await.unwrap_err();
    assert!(matches!(err, Error::UnknownAlias(_)));
    assert!(!module.running());
}

#[tokio::test]
async fn test_internal_mode_neighbours() {
    let (session, sender, _) = session_with(lan());
    let module = spoofer(&session);
    session.params.set(PARAM_TARGETS, "10.0.0.5").unwrap();
    session.params.set(PARAM_INTERNAL, "true").unwrap();
    module.configure().await.unwrap();
    let beacon = module.beacon();

    let neighbours = beacon.neighbours();
    assert_eq!(neighbours.len(), 254);
    assert!(!neighbours.contains(&"10.0.0.1".parse().unwrap()));
    assert!(!neighbours.contains(&"10.0.0.2".parse().unwrap()));

    beacon.unspoof().await;
    let restored: Vec<(Ipv4Addr, MacAddr)> = sender
        .arp_replies()
        .iter()
        .filter(|(dst, _)| *dst == m(5))
        .map(|(_, arp)| (arp.sender_proto_addr, arp.sender_hw_addr))
        .collect();
    assert!(restored.contains(&(ip4("10.0.0.1"), GATEWAY_MAC)));
    assert!(restored.contains(&(ip4("10.0.0.6"), m(6))));
    assert!(restored.contains(&(ip4("10.0.0.7"), m(7))));
    assert!(!restored.iter().any(|(ip, _)| *ip == ip4("10.0.0.5")));
}

#[test]
fn test_default_targets_is_interface_subnet() {
    let (session, _, _) = session_with(lan());
    let _module = spoofer(&session);
    assert_eq!(session.params.string(PARAM_TARGETS).unwrap(), "10.0.0.0/24");
    assert!(!session.params.bool(PARAM_FULLDUPLEX).unwrap());
}
