//! End-to-end protocol tests: bind a real device over UDP and drive it
//! with encoded SNMP datagrams, mirroring how an external manager would.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::watch;

use snmp_fleet_sim::behavior::Behavior;
use snmp_fleet_sim::codec::{self, Message, PduKind, VarBind};
use snmp_fleet_sim::config::GeneralConfig;
use snmp_fleet_sim::device::Device;
use snmp_fleet_sim::oid::Oid;
use snmp_fleet_sim::profile::{DeviceTypeId, OidRecord, Profile, ProfileStore};
use snmp_fleet_sim::value::TypedValue;

async fn spawn_test_device(profile: Profile) -> (Arc<Device>, u16, watch::Sender<bool>) {
    let profiles = Arc::new(ProfileStore::new());
    let device_type = DeviceTypeId::new("cable_modem");
    profiles.load(device_type.clone(), profile).await;

    // Bind to port 0 to let the OS pick one, then discover it by binding
    // a throwaway socket first. Since Device::run binds its own socket
    // internally, we instead bind directly here to learn a free port.
    let probe = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = probe.local_addr().unwrap().port();
    drop(probe);

    let general = Arc::new(GeneralConfig {
        node_id: "test-node".to_string(),
        description: "test device".to_string(),
        location: "test lab".to_string(),
        contact: "test@example.com".to_string(),
    });

    let device = Device::new(
        device_type,
        port,
        "127.0.0.1".to_string(),
        b"public".to_vec(),
        profiles,
        general,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let spawned = device.clone();
    tokio::spawn(async move {
        let _ = spawned.run(shutdown_rx, Duration::from_millis(200)).await;
    });

    // Give the device task a moment to bind before the test sends traffic.
    for _ in 0..50 {
        if matches!(
            device.lifecycle_state().await,
            snmp_fleet_sim::device::LifecycleState::Ready
        ) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    (device, port, shutdown_tx)
}

fn sys_descr_profile() -> Profile {
    Profile::from_records(vec![
        OidRecord::new(
            "1.3.6.1.2.1.1.1.0".parse().unwrap(),
            TypedValue::OctetString(b"simulated cable modem".to_vec()),
            Behavior::StaticValue,
        ),
        OidRecord::new(
            "1.3.6.1.2.1.1.3.0".parse().unwrap(),
            TypedValue::TimeTicks(0),
            Behavior::CounterDrift { rate_per_sec: 100 },
        ),
        OidRecord::new(
            "1.3.6.1.2.1.2.2.1.10.1".parse().unwrap(),
            TypedValue::Counter32(4_000_000_000),
            Behavior::CounterDrift { rate_per_sec: 1000 },
        ),
    ])
    .unwrap()
}

async fn send_and_recv(client: &UdpSocket, target: u16, request: &Message) -> Message {
    let bytes = codec::encode_message(request);
    client
        .send_to(&bytes, ("127.0.0.1", target))
        .await
        .unwrap();

    let mut buf = [0u8; 65536];
    let (len, _peer) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
        .await
        .expect("response timed out")
        .unwrap();
    codec::decode_message(&buf[..len]).unwrap()
}

#[tokio::test]
async fn get_request_hits_a_known_oid() {
    let (_device, port, shutdown_tx) = spawn_test_device(sys_descr_profile()).await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let request = Message {
        version: codec::VERSION_V2C,
        community: b"public".to_vec(),
        kind: PduKind::GetRequest,
        request_id: 1,
        error_status: 0,
        error_index: 0,
        varbinds: vec![VarBind::new(
            "1.3.6.1.2.1.1.1.0".parse().unwrap(),
            TypedValue::Null,
        )],
    };
    let response = send_and_recv(&client, port, &request).await;

    assert_eq!(response.kind, PduKind::Response);
    assert_eq!(response.error_status, 0);
    assert_eq!(
        response.varbinds[0].value,
        TypedValue::OctetString(b"simulated cable modem".to_vec())
    );

    let _ = shutdown_tx.send(true);
}

#[tokio::test]
async fn get_request_miss_is_no_such_object_in_v2c() {
    let (_device, port, shutdown_tx) = spawn_test_device(sys_descr_profile()).await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let missing: Oid = "1.3.6.1.2.1.99.99.0".parse().unwrap();
    let request = Message {
        version: codec::VERSION_V2C,
        community: b"public".to_vec(),
        kind: PduKind::GetRequest,
        request_id: 2,
        error_status: 0,
        error_index: 0,
        varbinds: vec![VarBind::new(missing, TypedValue::Null)],
    };
    let response = send_and_recv(&client, port, &request).await;

    assert_eq!(response.error_status, 0);
    assert_eq!(response.varbinds[0].value, TypedValue::NoSuchObject);

    let _ = shutdown_tx.send(true);
}

#[tokio::test]
async fn get_next_walks_lexicographic_order() {
    let (_device, port, shutdown_tx) = spawn_test_device(sys_descr_profile()).await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let request = Message {
        version: codec::VERSION_V2C,
        community: b"public".to_vec(),
        kind: PduKind::GetNextRequest,
        request_id: 3,
        error_status: 0,
        error_index: 0,
        varbinds: vec![VarBind::new(
            "1.3.6.1.2.1.1.0".parse().unwrap(),
            TypedValue::Null,
        )],
    };
    let response = send_and_recv(&client, port, &request).await;

    assert_eq!(
        response.varbinds[0].oid,
        "1.3.6.1.2.1.1.1.0".parse::<Oid>().unwrap()
    );

    let _ = shutdown_tx.send(true);
}

#[tokio::test]
async fn get_bulk_bounds_total_response_size() {
    let (_device, port, shutdown_tx) = spawn_test_device(sys_descr_profile()).await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let request = Message {
        version: codec::VERSION_V2C,
        community: b"public".to_vec(),
        kind: PduKind::GetBulkRequest,
        request_id: 4,
        error_status: 0,  // non-repeaters
        error_index: 5,   // max-repetitions
        varbinds: vec![VarBind::new(
            "1.3.6.1.2.1.1.0".parse().unwrap(),
            TypedValue::Null,
        )],
    };
    let response = send_and_recv(&client, port, &request).await;

    // One repeating varbind, max_repetitions=5 => exactly 5 varbinds back,
    // padded with EndOfMibView once the profile is exhausted (no hang).
    assert_eq!(response.varbinds.len(), 5);
    assert!(response
        .varbinds
        .iter()
        .any(|vb| vb.value == TypedValue::EndOfMibView));

    let _ = shutdown_tx.send(true);
}

#[tokio::test]
async fn community_mismatch_is_silently_dropped() {
    let (_device, port, shutdown_tx) = spawn_test_device(sys_descr_profile()).await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let request = Message {
        version: codec::VERSION_V2C,
        community: b"wrong-community".to_vec(),
        kind: PduKind::GetRequest,
        request_id: 5,
        error_status: 0,
        error_index: 0,
        varbinds: vec![VarBind::new(
            "1.3.6.1.2.1.1.1.0".parse().unwrap(),
            TypedValue::Null,
        )],
    };
    let bytes = codec::encode_message(&request);
    client
        .send_to(&bytes, ("127.0.0.1", port))
        .await
        .unwrap();

    let mut buf = [0u8; 65536];
    let result = tokio::time::timeout(Duration::from_millis(500), client.recv_from(&mut buf)).await;
    assert!(result.is_err(), "expected no response for a bad community");

    let _ = shutdown_tx.send(true);
}
