//! S7 客户端（ISO-on-TCP）
//!
//! 实现寄存器驱动所需的最小子集：
//! - TPKT (RFC 1006) + COTP 连接请求，远端 TSAP = `0x01, rack * 0x20 + slot`
//! - S7 Setup Communication，协商 PDU 长度
//! - Read Var：按 DB 编号、字节偏移、长度读取一段区域
//!
//! 每次调用产生恰好一个请求与一个应答；不做重试与重连。

use crate::error::ProtocolError;
use crate::register::BlockReader;
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

const TPKT_VERSION: u8 = 0x03;
const TPKT_HEADER_LEN: usize = 4;
const COTP_CONNECT_CONFIRM: u8 = 0xD0;
const COTP_DATA: [u8; 3] = [0x02, 0xF0, 0x80];
const S7_PROTOCOL_ID: u8 = 0x32;
const S7_JOB: u8 = 0x01;
const S7_ACK_DATA: u8 = 0x03;
const S7_FN_SETUP: u8 = 0xF0;
const S7_FN_READ_VAR: u8 = 0x04;
const S7_AREA_DB: u8 = 0x84;
const S7_TRANSPORT_BYTE: u8 = 0x02;
const S7_ITEM_OK: u8 = 0xFF;
/// 请求的 PDU 长度（PLC 可能协商为更小的值）
const REQUESTED_PDU_LEN: u16 = 480;
/// 读应答中除数据外的固定开销：COTP(3) + 头(12) + 参数(2) + 数据项头(4)
const READ_RESPONSE_OVERHEAD: u16 = 21;
/// 单帧上限，防止对端声明异常长度
const MAX_TPKT_LEN: usize = 8192;

/// S7 端点参数
#[derive(Debug, Clone)]
pub struct S7Endpoint {
    pub host: String,
    pub port: u16,
    pub rack: u16,
    pub slot: u16,
    pub timeout: Duration,
}

/// S7 客户端
pub struct S7Client {
    endpoint: S7Endpoint,
    stream: Option<TcpStream>,
    pdu_ref: u16,
    pdu_len: u16,
}

impl S7Client {
    pub fn new(endpoint: S7Endpoint) -> Self {
        Self {
            endpoint,
            stream: None,
            pdu_ref: 0,
            pdu_len: REQUESTED_PDU_LEN,
        }
    }

    /// 协商后的 PDU 长度
    pub fn pdu_len(&self) -> u16 {
        self.pdu_len
    }

    fn next_pdu_ref(&mut self) -> u16 {
        self.pdu_ref = self.pdu_ref.wrapping_add(1);
        self.pdu_ref
    }

    async fn handshake(&mut self, stream: &mut TcpStream) -> Result<u16, ProtocolError> {
        let request = connection_request(self.endpoint.rack, self.endpoint.slot);
        stream.write_all(&request).await?;
        let payload = read_tpkt(stream).await?;
        parse_connection_confirm(&payload)?;

        let pdu_ref = self.next_pdu_ref();
        stream
            .write_all(&setup_communication(pdu_ref, REQUESTED_PDU_LEN))
            .await?;
        let payload = read_tpkt(stream).await?;
        parse_setup_response(&payload)
    }

    async fn exchange(&mut self, request: Vec<u8>) -> Result<Vec<u8>, ProtocolError> {
        let stream = self.stream.as_mut().ok_or(ProtocolError::NotConnected)?;
        stream.write_all(&request).await?;
        read_tpkt(stream).await
    }
}

#[async_trait]
impl BlockReader for S7Client {
    async fn connect(&mut self) -> Result<(), ProtocolError> {
        self.stream = None;
        let addr = format!("{}:{}", self.endpoint.host, self.endpoint.port);
        let limit = self.endpoint.timeout;

        let mut stream = match timeout(limit, TcpStream::connect(addr.as_str())).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => return Err(ProtocolError::Connection(err.to_string())),
            Err(_) => {
                return Err(ProtocolError::Timeout(format!(
                    "connect to {addr} after {}ms",
                    limit.as_millis()
                )))
            }
        };
        let _ = stream.set_nodelay(true);

        let pdu_len = match timeout(limit, self.handshake(&mut stream)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ProtocolError::Timeout(format!(
                    "s7 handshake with {addr} after {}ms",
                    limit.as_millis()
                )))
            }
        };

        info!(
            target: "skc.protocol",
            addr = %addr,
            rack = self.endpoint.rack,
            slot = self.endpoint.slot,
            pdu_len = pdu_len,
            "s7 session established"
        );
        self.pdu_len = pdu_len;
        self.stream = Some(stream);
        Ok(())
    }

    async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
    }

    async fn read_block(
        &mut self,
        block: u16,
        offset: u32,
        size: u16,
    ) -> Result<Vec<u8>, ProtocolError> {
        let max = self.pdu_len.saturating_sub(READ_RESPONSE_OVERHEAD);
        if size > max {
            return Err(ProtocolError::Parse(format!(
                "read of {size} bytes exceeds pdu capacity {max}"
            )));
        }
        if offset > 0x1F_FFFF {
            return Err(ProtocolError::Parse(format!("offset {offset} out of range")));
        }

        let pdu_ref = self.next_pdu_ref();
        let request = read_request(pdu_ref, block, offset, size);
        let limit = self.endpoint.timeout;
        let payload = match timeout(limit, self.exchange(request)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ProtocolError::Timeout(format!(
                    "read DB{block}.{offset} after {}ms",
                    limit.as_millis()
                )))
            }
        };
        let data = parse_read_response(&payload, size)?;
        debug!(target: "skc.protocol", block, offset, size, "s7 read ok");
        Ok(data)
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

/// 读取一个 TPKT 帧，返回去掉 TPKT 头的负载
async fn read_tpkt<S>(stream: &mut S) -> Result<Vec<u8>, ProtocolError>
where
    S: tokio::io::AsyncRead + Unpin,
{
    let mut header = [0u8; TPKT_HEADER_LEN];
    match stream.read_exact(&mut header).await {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::Disconnected)
        }
        Err(err) => return Err(ProtocolError::Io(err)),
    }
    if header[0] != TPKT_VERSION {
        return Err(ProtocolError::Plc(format!(
            "bad tpkt version 0x{:02x}",
            header[0]
        )));
    }
    let total = u16::from_be_bytes([header[2], header[3]]) as usize;
    if !(TPKT_HEADER_LEN + 2..=MAX_TPKT_LEN).contains(&total) {
        return Err(ProtocolError::Plc(format!("bad tpkt length {total}")));
    }
    let mut payload = vec![0u8; total - TPKT_HEADER_LEN];
    match stream.read_exact(&mut payload).await {
        Ok(_) => Ok(payload),
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(ProtocolError::Disconnected)
        }
        Err(err) => Err(ProtocolError::Io(err)),
    }
}

fn tpkt(payload: &[u8]) -> Vec<u8> {
    let total = (payload.len() + TPKT_HEADER_LEN) as u16;
    let mut frame = Vec::with_capacity(total as usize);
    frame.extend_from_slice(&[TPKT_VERSION, 0x00]);
    frame.extend_from_slice(&total.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// COTP 连接请求（CR）
pub(crate) fn connection_request(rack: u16, slot: u16) -> Vec<u8> {
    let remote_tsap = (rack * 0x20 + slot) as u8;
    tpkt(&[
        0x11, // COTP 长度
        0xE0, // CR
        0x00, 0x00, // 目的引用
        0x00, 0x01, // 源引用
        0x00, // class 0
        0xC0, 0x01, 0x0A, // TPDU 大小 1024
        0xC1, 0x02, 0x01, 0x00, // 本地 TSAP
        0xC2, 0x02, 0x01, remote_tsap, // 远端 TSAP
    ])
}

pub(crate) fn parse_connection_confirm(payload: &[u8]) -> Result<(), ProtocolError> {
    match payload.get(1) {
        Some(&COTP_CONNECT_CONFIRM) => Ok(()),
        Some(other) => Err(ProtocolError::Connection(format!(
            "cotp connection rejected (pdu type 0x{other:02x})"
        ))),
        None => Err(ProtocolError::Plc("short cotp reply".to_string())),
    }
}

fn s7_job(pdu_ref: u16, params: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(COTP_DATA.len() + 10 + params.len());
    payload.extend_from_slice(&COTP_DATA);
    payload.extend_from_slice(&[S7_PROTOCOL_ID, S7_JOB, 0x00, 0x00]);
    payload.extend_from_slice(&pdu_ref.to_be_bytes());
    payload.extend_from_slice(&(params.len() as u16).to_be_bytes());
    payload.extend_from_slice(&[0x00, 0x00]);
    payload.extend_from_slice(params);
    tpkt(&payload)
}

pub(crate) fn setup_communication(pdu_ref: u16, pdu_len: u16) -> Vec<u8> {
    let len = pdu_len.to_be_bytes();
    s7_job(
        pdu_ref,
        &[S7_FN_SETUP, 0x00, 0x00, 0x01, 0x00, 0x01, len[0], len[1]],
    )
}

pub(crate) fn read_request(pdu_ref: u16, block: u16, offset: u32, size: u16) -> Vec<u8> {
    let bit_address = (offset * 8).to_be_bytes();
    let size = size.to_be_bytes();
    let block = block.to_be_bytes();
    s7_job(
        pdu_ref,
        &[
            S7_FN_READ_VAR,
            0x01, // 数据项个数
            0x12, 0x0A, 0x10, // 变量规格
            S7_TRANSPORT_BYTE,
            size[0],
            size[1],
            block[0],
            block[1],
            S7_AREA_DB,
            bit_address[1],
            bit_address[2],
            bit_address[3],
        ],
    )
}

/// 校验 ack_data 头，返回参数区起点
fn check_ack_header(payload: &[u8]) -> Result<usize, ProtocolError> {
    const HEADER_START: usize = 3;
    const PARAMS_START: usize = HEADER_START + 12;
    if payload.len() < PARAMS_START {
        return Err(ProtocolError::Plc(format!(
            "short s7 reply ({} bytes)",
            payload.len()
        )));
    }
    let header = &payload[HEADER_START..PARAMS_START];
    if header[0] != S7_PROTOCOL_ID || header[1] != S7_ACK_DATA {
        return Err(ProtocolError::Plc(format!(
            "unexpected s7 pdu (id 0x{:02x}, type 0x{:02x})",
            header[0], header[1]
        )));
    }
    let (class, code) = (header[10], header[11]);
    if class != 0 || code != 0 {
        return Err(ProtocolError::Plc(format!(
            "s7 error class 0x{class:02x} code 0x{code:02x}"
        )));
    }
    Ok(PARAMS_START)
}

pub(crate) fn parse_setup_response(payload: &[u8]) -> Result<u16, ProtocolError> {
    let params = check_ack_header(payload)?;
    let body = &payload[params..];
    if body.len() < 8 || body[0] != S7_FN_SETUP {
        return Err(ProtocolError::Plc("bad setup communication reply".to_string()));
    }
    let pdu_len = u16::from_be_bytes([body[6], body[7]]);
    if pdu_len <= READ_RESPONSE_OVERHEAD {
        return Err(ProtocolError::Plc(format!("negotiated pdu too small: {pdu_len}")));
    }
    Ok(pdu_len)
}

pub(crate) fn parse_read_response(payload: &[u8], expected: u16) -> Result<Vec<u8>, ProtocolError> {
    let params = check_ack_header(payload)?;
    let body = &payload[params..];
    if body.len() < 6 || body[0] != S7_FN_READ_VAR {
        return Err(ProtocolError::Plc("bad read var reply".to_string()));
    }
    let item = &body[2..];
    let return_code = item[0];
    if return_code != S7_ITEM_OK {
        return Err(ProtocolError::Parse(describe_item_error(return_code)));
    }
    let transport = item[1];
    let declared = u16::from_be_bytes([item[2], item[3]]);
    // 0x03 位 / 0x04 字节-字-双字：长度以位计；其余以字节计
    let len = usize::from(match transport {
        0x03 | 0x04 | 0x05 => declared.div_ceil(8),
        _ => declared,
    });
    let data = &item[4..];
    if data.len() < len || len != expected as usize {
        return Err(ProtocolError::Plc(format!(
            "read returned {} bytes, expected {}",
            data.len().min(len),
            expected
        )));
    }
    Ok(data[..len].to_vec())
}

fn describe_item_error(code: u8) -> String {
    match code {
        0x01 => "hardware fault".to_string(),
        0x03 => "access denied".to_string(),
        0x05 => "address out of range".to_string(),
        0x06 => "data type not supported".to_string(),
        0x07 => "data type inconsistent".to_string(),
        0x0A => "object does not exist".to_string(),
        other => format!("item error 0x{other:02x}"),
    }
}
