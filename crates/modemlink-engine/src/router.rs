//! Unsolicited notification routing.
//!
//! Every line the IO task classifies as unsolicited lands here. The router
//! never issues commands: a notification that calls for a follow-up command
//! (data waiting on the listen socket) is converted into a
//! [`ReceiveTrigger`] for the session's receive loop to act on, keeping the
//! command queue free of work done from inside a parser.
//!
//! Registration notices are delegated to the device profile since families
//! differ in their `+CEREG` forms; everything else is parsed here.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use modemlink_core::events::ModemEvent;
use modemlink_core::helpers::rsrp_raw_to_dbm;
use modemlink_core::mailbox::Mailboxes;
use modemlink_core::profile::DeviceProfile;
use modemlink_core::status::ModemStatus;
use modemlink_core::types::{GnssFix, SignalQuality, SocketDataChunk};

use crate::protocol::split_fields;

/// A request for the session to issue a downlink read.
///
/// Emitted when a notification indicates pending data; consumed outside the
/// router so the follow-up command never runs on the notification path.
#[derive(Debug, Clone, Copy)]
pub struct ReceiveTrigger;

/// Routes unsolicited lines to status, mailboxes, triggers, and events.
pub struct UrcRouter {
    profile: Arc<dyn DeviceProfile>,
    status: Arc<ModemStatus>,
    mailboxes: Arc<Mailboxes>,
    events: broadcast::Sender<ModemEvent>,
    triggers: mpsc::UnboundedSender<ReceiveTrigger>,
}

impl UrcRouter {
    pub fn new(
        profile: Arc<dyn DeviceProfile>,
        status: Arc<ModemStatus>,
        mailboxes: Arc<Mailboxes>,
        events: broadcast::Sender<ModemEvent>,
        triggers: mpsc::UnboundedSender<ReceiveTrigger>,
    ) -> Self {
        Self {
            profile,
            status,
            mailboxes,
            events,
            triggers,
        }
    }

    /// Consume the URC stream until the session is cancelled.
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<String>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                line = rx.recv() => match line {
                    Some(line) => self.handle_line(&line),
                    None => break,
                },
            }
        }
        debug!("notification router stopped");
    }

    /// Classify and act on one unsolicited line.
    ///
    /// Malformed notifications are logged and dropped; they never fail the
    /// session.
    pub fn handle_line(&self, line: &str) {
        let line = line.trim();

        if let Some(registration) = self.profile.parse_registration_notice(line) {
            debug!(%registration, "registration notice");
            if self.status.set_registration(registration) {
                let _ = self.events.send(ModemEvent::RegistrationChanged {
                    status: registration,
                });
            }
            return;
        }

        if let Some(body) = strip_tag(line, "+CSCON") {
            self.handle_cscon(body);
        } else if let Some(body) = strip_tag(line, "%CESQ") {
            self.handle_cesq(body);
        } else if let Some(body) = strip_tag(line, "%SOCKETDATA") {
            self.handle_socketdata(body);
        } else if let Some(body) = strip_tag(line, "%SOCKETCMD") {
            self.handle_socketcmd(body);
        } else if let Some(body) = strip_tag(line, "%SOCKETEV") {
            self.handle_socketev(body);
        } else if strip_tag(line, "%BOOTEV").is_some() {
            debug!("boot event");
            self.mailboxes.boot.put(());
        } else if let Some(body) = strip_tag(line, "%IGNSSEVU") {
            self.handle_gnss(body);
        } else if strip_tag(line, "%PINGCMD").is_some() {
            debug!(line, "ping result");
            self.mailboxes.ping.put(line.to_string());
        } else {
            debug!(line, "unhandled notification");
        }
    }

    /// `+CSCON: <mode>` connection state. Entering connected state is the
    /// moment pending downlink data may be readable.
    fn handle_cscon(&self, body: &str) {
        let fields = split_fields(body);
        match fields.first().map(|f| f.text.parse::<u8>()) {
            Some(Ok(1)) => {
                debug!("RRC connected, triggering downlink check");
                let _ = self.triggers.send(ReceiveTrigger);
            }
            Some(Ok(_)) => {}
            _ => debug!(body, "malformed +CSCON notification"),
        }
    }

    /// `%CESQ: <rsrp>,<rsrq>,<snr>,<rscp>` signal quality sample.
    fn handle_cesq(&self, body: &str) {
        let fields = split_fields(body);
        let raw: Vec<i32> = fields
            .iter()
            .filter_map(|f| f.text.parse::<i32>().ok())
            .collect();
        let Some(&rsrp_raw) = raw.first() else {
            debug!(body, "malformed %CESQ notification");
            return;
        };
        // 255 is the "not known or not detectable" sentinel.
        let Some(rsrp) = rsrp_raw_to_dbm(rsrp_raw) else {
            return;
        };
        let quality = SignalQuality {
            rsrp,
            rsrq: raw.get(1).copied().unwrap_or(0),
            sinr: raw.get(2).copied().unwrap_or(0),
            rssi: raw.get(3).copied().unwrap_or(0),
        };
        self.status.set_signal(quality);
        let _ = self.events.send(ModemEvent::SignalQualityUpdated { quality });
    }

    /// `%SOCKETDATA:<id>,<len>,<more>,"<hex>"[,"<ip>",<port>]` data chunk.
    fn handle_socketdata(&self, body: &str) {
        let fields = split_fields(body);
        let parsed = (|| -> Option<SocketDataChunk> {
            let socket_id = fields.first()?.text.parse().ok()?;
            let length = fields.get(1)?.text.parse().ok()?;
            let more = fields.get(2)?.text == "1";
            let hex_payload = fields.get(3)?.text.clone();
            let source_ip = fields.get(4).map(|f| f.text.clone());
            let source_port = fields.get(5).and_then(|f| f.text.parse().ok());
            Some(SocketDataChunk {
                socket_id,
                length,
                more,
                hex_payload,
                source_ip,
                source_port,
            })
        })();
        match parsed {
            Some(chunk) => self.mailboxes.socket_data.put(chunk),
            None => debug!(body, "malformed %SOCKETDATA notification"),
        }
    }

    /// `%SOCKETCMD:<socket_id>` allocation notice.
    fn handle_socketcmd(&self, body: &str) {
        match body.trim().parse::<u32>() {
            Ok(socket_id) => {
                debug!(socket_id, "socket allocated");
                self.mailboxes.socket_alloc.put(socket_id);
            }
            Err(_) => debug!(body, "malformed %SOCKETCMD notification"),
        }
    }

    /// `%SOCKETEV:<event>,<socket_id>` socket event. Data waiting on the
    /// listen socket triggers a downlink read.
    fn handle_socketev(&self, body: &str) {
        let fields = split_fields(body);
        let socket_id: Option<u32> = fields.get(1).and_then(|f| f.text.parse().ok());
        match (socket_id, self.status.listen_socket_id()) {
            (Some(id), Some(listen)) if id == listen => {
                debug!(socket_id = id, "data waiting on listen socket");
                let _ = self.triggers.send(ReceiveTrigger);
            }
            (Some(id), _) => debug!(socket_id = id, "socket event on non-listen socket"),
            (None, _) => debug!(body, "malformed %SOCKETEV notification"),
        }
    }

    /// `%IGNSSEVU: "FIX",...,"<lat>","<lon>"` GNSS event.
    fn handle_gnss(&self, body: &str) {
        let fields = split_fields(body);
        if fields.first().map(|f| f.text.as_str()) != Some("FIX") {
            debug!(body, "GNSS event other than FIX");
            return;
        }
        let quoted: Vec<&str> = fields
            .iter()
            .filter(|f| f.quoted)
            .map(|f| f.text.as_str())
            .collect();
        let fix = (|| -> Option<GnssFix> {
            let lon = quoted.last()?.parse().ok()?;
            let lat = quoted.get(quoted.len().checked_sub(2)?)?.parse().ok()?;
            Some(GnssFix {
                latitude: lat,
                longitude: lon,
            })
        })();
        match fix {
            Some(fix) => {
                debug!(lat = fix.latitude, lon = fix.longitude, "GNSS fix");
                self.status.set_fix(fix);
                self.mailboxes.gnss_fix.put(fix);
                let _ = self.events.send(ModemEvent::LocationFix { fix });
            }
            None => debug!(body, "FIX event without coordinates"),
        }
    }
}

/// Strips a notification tag plus its `:` separator, tolerating the
/// with-space (`+CEREG: 5`) and without-space (`%SOCKETEV:1,2`) forms.
fn strip_tag<'a>(line: &'a str, tag: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(tag)?;
    let rest = rest.strip_prefix(':').unwrap_or(rest);
    Some(rest.trim_start())
}
