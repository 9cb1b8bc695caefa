//! 寄存器驱动 + S7 客户端集成测试（本地回环模拟 PLC）

use skc_protocol::{AnyDriver, Driver, DriverSpec};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

fn tpkt(payload: &[u8]) -> Vec<u8> {
    let total = (payload.len() + 4) as u16;
    let mut frame = vec![0x03, 0x00];
    frame.extend_from_slice(&total.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

fn ack(pdu_ref: [u8; 2], params: &[u8], data: &[u8]) -> Vec<u8> {
    let mut payload = vec![0x02, 0xF0, 0x80, 0x32, 0x03, 0x00, 0x00, pdu_ref[0], pdu_ref[1]];
    payload.extend_from_slice(&(params.len() as u16).to_be_bytes());
    payload.extend_from_slice(&(data.len() as u16).to_be_bytes());
    payload.extend_from_slice(&[0x00, 0x00]);
    payload.extend_from_slice(params);
    payload.extend_from_slice(data);
    tpkt(&payload)
}

async fn read_frame(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await.ok()?;
    let total = u16::from_be_bytes([header[2], header[3]]) as usize;
    let mut payload = vec![0u8; total - 4];
    stream.read_exact(&mut payload).await.ok()?;
    Some(payload)
}

/// 只实现 CR / Setup / Read Var 的 PLC
async fn serve_plc(mut stream: TcpStream, blocks: HashMap<u16, Vec<u8>>) {
    while let Some(payload) = read_frame(&mut stream).await {
        let reply = if payload[1] == 0xE0 {
            tpkt(&[0x11, 0xD0, 0x00, 0x01, 0x00, 0x01, 0x00])
        } else {
            let pdu_ref = [payload[7], payload[8]];
            let params = &payload[13..];
            match params[0] {
                0xF0 => ack(pdu_ref, &[0xF0, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0xF0], &[]),
                0x04 => {
                    let size = u16::from_be_bytes([params[6], params[7]]) as usize;
                    let block = u16::from_be_bytes([params[8], params[9]]);
                    let bit_address =
                        u32::from_be_bytes([0, params[11], params[12], params[13]]) as usize;
                    let start = bit_address / 8;
                    match blocks.get(&block).and_then(|data| data.get(start..start + size)) {
                        Some(data) => {
                            let mut item = vec![0xFF, 0x04];
                            item.extend_from_slice(&((size * 8) as u16).to_be_bytes());
                            item.extend_from_slice(data);
                            ack(pdu_ref, &[0x04, 0x01], &item)
                        }
                        None => ack(pdu_ref, &[0x04, 0x01], &[0x0A, 0x00, 0x00, 0x00]),
                    }
                }
                _ => return,
            }
        };
        if stream.write_all(&reply).await.is_err() {
            return;
        }
    }
}

async fn start_plc() -> SocketAddr {
    let mut db10 = vec![0x42, 0x48, 0x00, 0x00];
    db10.extend_from_slice(&(-12i16).to_be_bytes());
    db10.extend_from_slice(&99_000i32.to_be_bytes());
    let blocks = HashMap::from([(10u16, db10)]);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve_plc(stream, blocks.clone()));
        }
    });
    addr
}

fn spec(addr: SocketAddr, tags: &str) -> DriverSpec {
    let json = format!(
        r#"{{"type": "siemens_s7", "ip": "{}", "port": {}, "rack": 0, "slot": 1, "tags": {}}}"#,
        addr.ip(),
        addr.port(),
        tags
    );
    serde_json::from_str(&json).unwrap()
}

#[tokio::test]
async fn reads_tags_over_iso_on_tcp() {
    let addr = start_plc().await;
    let spec = spec(
        addr,
        r#"{
            "pressure": {"db": 10, "start": 0, "size": 4, "dtype": "REAL"},
            "rpm": {"db": 10, "start": 4, "size": 2, "dtype": "INT"},
            "hours": {"db": 10, "start": 6, "size": 4, "dtype": "DINT"}
        }"#,
    );
    let mut driver = spec.build().unwrap();
    assert!(matches!(driver, AnyDriver::Register(_)));
    assert_eq!(driver.read_once().await.error(), Some("not connected"));

    driver.connect().await.unwrap();
    let result = driver.read_once().await;
    assert!(result.is_ok(), "{:?}", result.error());
    let names: Vec<&str> = result.values().names().collect();
    assert_eq!(names, vec!["pressure", "rpm", "hours"]);
    assert_eq!(result.values().get("pressure"), Some(50.0));
    assert_eq!(result.values().get("rpm"), Some(-12.0));
    assert_eq!(result.values().get("hours"), Some(99_000.0));

    driver.close().await;
    driver.close().await;
    assert!(!driver.is_connected());
}

#[tokio::test]
async fn missing_block_fails_whole_read_and_keeps_session() {
    let addr = start_plc().await;
    let spec = spec(
        addr,
        r#"{
            "pressure": {"db": 10, "start": 0, "size": 4, "dtype": "REAL"},
            "flow": {"db": 99, "start": 0, "size": 4, "dtype": "REAL"}
        }"#,
    );
    let mut driver = spec.build().unwrap();
    driver.connect().await.unwrap();

    let result = driver.read_once().await;
    assert!(!result.is_ok());
    assert!(result.values().is_empty());
    let error = result.error().unwrap();
    assert!(error.contains("flow"), "{error}");
    assert!(error.contains("object does not exist"));
    assert!(driver.is_connected());
}
