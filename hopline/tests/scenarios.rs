//! End-to-end chains against the scripted device simulator.

use std::sync::Arc;
use std::time::Duration;

use hopline::channel::{Script, ScriptedSpawner};
use hopline::{Chain, ChainBuilder, Driver, ErrorKind, HopInfo, PlatformId};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn chain(scripts: Vec<Script>, hops: Vec<HopInfo>) -> (Arc<ScriptedSpawner>, Chain) {
    init_logging();
    let spawner = Arc::new(ScriptedSpawner::new(scripts));
    let chain = ChainBuilder::new()
        .spawner(spawner.clone())
        .hops(hops)
        .build()
        .unwrap();
    (spawner, chain)
}

const SHOW_VERSION: &str = "Cisco IOS Software, C3750E Software (C3750E-UNIVERSALK9-M), Version 15.0(2)SE, RELEASE SOFTWARE (fc1)\r\n\
Technical Support: http://www.cisco.com/techsupport\r\n\
\r\n\
cisco WS-C3750X-24 (PowerPC405) processor (revision A0) with 262144K bytes of memory.\r\n\
router#";

const SHOW_INVENTORY: &str = "NAME: \"1\", DESCR: \"WS-C3750X-24\"\r\n\
PID: WS-C3750X-24T-S   , VID: V02  , SN: FDO1633Q14M\r\n\
\r\n\
router#";

const SHOW_USERS: &str = "    Line       User       Host(s)              Idle       Location\r\n\
*  0 con 0     admin      idle                 00:00:00\r\n\
\r\n\
router#";

/// Telnet login on an IOS router answering the discovery commands.
fn ios_router() -> Script {
    Script::new()
        .emit("Trying 10.0.0.2...\r\nConnected to 10.0.0.2.\r\nEscape character is '^]'.\r\n\r\n")
        .emit("User Access Verification\r\n\r\nUsername: ")
        .reply("admin", "\r\nPassword: ")
        .echo(false)
        .reply("secret", "\r\nrouter#")
        .echo(true)
        .prompt("router#")
        .reply("show version", SHOW_VERSION)
        .reply("show inventory", SHOW_INVENTORY)
        .reply("show users", SHOW_USERS)
}

fn router_hop() -> HopInfo {
    HopInfo::new("10.0.0.2").username("admin").password("secret")
}

#[tokio::test]
async fn test_telnet_login_and_discovery() {
    let (spawner, mut chain) = chain(vec![ios_router()], vec![router_hop()]);
    chain.connect().await.unwrap();

    let target = chain.target();
    assert!(chain.is_connected());
    assert_eq!(target.state.prompt.as_deref(), Some("router#"));
    assert_eq!(target.hostname(), "router");
    assert_eq!(target.driver().platform(), PlatformId::Ios);
    assert_eq!(target.state.os_type.as_deref(), Some("IOS"));
    assert_eq!(target.state.os_version.as_deref(), Some("15.0(2)SE"));
    assert_eq!(target.state.udi.as_ref().unwrap().sn, "FDO1633Q14M");
    assert_eq!(target.state.is_console, Some(true));

    let log = spawner.log();
    assert_eq!(log.spawned, vec!["telnet 10.0.0.2 23".to_string()]);
    assert!(log.sent.contains("terminal len 0\n"));
}

#[tokio::test]
async fn test_invalid_command_is_syntax_error() {
    let script = ios_router().reply(
        "wrongcommand",
        "        ^\r\n% Invalid input detected at '^' marker.\r\n\r\nrouter#",
    );
    let (_, mut chain) = chain(vec![script], vec![router_hop()]);
    chain.connect().await.unwrap();

    let err = chain
        .send("wrongcommand", Duration::from_secs(60), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CommandSyntax);
    assert_eq!(err.command(), Some("wrongcommand"));
    assert_eq!(err.host(), Some("router"));

    // the session is still usable
    assert!(chain.is_connected());
    let output = chain.send("show clock", Duration::from_secs(60), None).await.unwrap();
    assert_eq!(output, "");
}

#[tokio::test]
async fn test_failed_jump_host_stops_chain() {
    // jump-a is reached over ssh; jump-b rejects the password and the
    // target is never attempted.
    let script = Script::new()
        .echo(false)
        .emit("admin@jump-a's password: ")
        .reply("secret", "\r\nLast login: Mon Jan  1 00:00:00 2024\r\njump-a$ ")
        .echo(true)
        .prompt("jump-a$ ")
        .reply(
            "telnet jump-b 23",
            "Trying 10.1.1.1...\r\nConnected to jump-b.\r\nEscape character is '^]'.\r\n\r\nlogin: ",
        )
        .reply("admin", "\r\nPassword: ")
        .echo(false)
        .reply("wrong", "\r\nLogin incorrect\r\nlogin: ");

    let hops = vec![
        HopInfo::new("jump-a").protocol("ssh").username("admin").password("secret"),
        HopInfo::new("jump-b").username("admin").password("wrong"),
        HopInfo::new("router").username("admin").password("secret"),
    ];
    let (spawner, mut chain) = chain(vec![script], hops);

    let err = chain.connect().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectionAuthentication);
    assert_eq!(err.host(), Some("jump-b"));

    let devices = chain.devices();
    assert!(devices[0].state.connected);
    assert!(!devices[1].state.connected);
    assert!(!devices[2].state.connected);

    let log = spawner.log();
    assert_eq!(log.spawned.len(), 1);
    assert!(log.spawned[0].ends_with("admin@jump-a"));
    assert!(!log.sent.contains("telnet router"));
}

#[tokio::test]
async fn test_ssh_falls_back_to_protocol_one() {
    let v2 = Script::new()
        .emit("Protocol major versions differ: 2 vs. 1\r\n")
        .close();
    let v1 = Script::new()
        .echo(false)
        .emit("admin@10.0.0.3's password: ")
        .reply("secret", "\r\nrouter#")
        .echo(true)
        .prompt("router#");

    let hop = HopInfo::new("10.0.0.3").protocol("ssh").username("admin").password("secret");
    let (spawner, mut chain) = chain(vec![v2, v1], vec![hop]);
    chain.connect().await.unwrap();

    let spawned = spawner.log().spawned;
    assert_eq!(spawned.len(), 2);
    assert!(spawned[0].contains(" -2 "));
    assert!(spawned[1].contains(" -1 "));
    assert_eq!(chain.target().state.prompt.as_deref(), Some("router#"));
}

#[tokio::test]
async fn test_disconnect_closes_session() {
    let (spawner, mut chain) = chain(vec![ios_router()], vec![router_hop()]);
    chain.connect().await.unwrap();
    chain.disconnect().await;

    assert!(!chain.is_connected());
    assert!(spawner.log().closed);
}
