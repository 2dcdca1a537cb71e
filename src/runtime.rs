// Service loop: command queries in, RPMs and health out
// Each tick drains pending command queries, then polls telemetry once.
// A failed poll publishes no RPMs for that tick; the next tick tries again.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::{Interval, MissedTickBehavior, interval};
use tracing::{debug, info, warn};
use zenoh::query::Query;

use crate::config::{
    SRV_MOTOR_ENUMS, SRV_SET_ALL_MOTORS, SRV_SET_MOTOR, SRV_STOP_ALL, SRV_STOP_MOTOR, Settings,
    TOPIC_HEALTH, TOPIC_RPMS,
};
use crate::messages::{
    CommandReply, MotorEnums, MotorRequest, MotorsRequest, RpmReport, RuntimeHealth,
    StopMotorRequest,
};
use crate::motor::{AxisMixer, MotorController, Slot, Transport};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A decoded command query
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceRequest {
    SetMotor(MotorRequest),
    SetAllMotors(MotorsRequest),
    StopMotor(StopMotorRequest),
    StopAll,
}

pub struct Runtime<T: Transport> {
    motors: MotorController<T>,
    health: RuntimeHealth,
}

impl<T: Transport> Runtime<T> {
    pub fn new(motors: MotorController<T>) -> Self {
        Self {
            motors,
            health: RuntimeHealth::Ok,
        }
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    pub fn motor_enums(&self) -> MotorEnums {
        self.motors.motor_enums()
    }

    /// Execute a command and report the outcome to the caller
    pub fn handle(&mut self, request: ServiceRequest) -> CommandReply {
        debug!("Handling {:?}", request);
        let result = match request {
            ServiceRequest::SetMotor(req) => match slot(req.motor_num) {
                Ok(slot) => self.motors.set_motor_pwm(slot, req.pwm),
                Err(reply) => return reply,
            },
            ServiceRequest::SetAllMotors(req) => self.motors.set_all_motors_pwm(&req.pwms),
            ServiceRequest::StopMotor(req) => match slot(req.motor_num) {
                Ok(slot) => self.motors.stop_motor(slot),
                Err(reply) => return reply,
            },
            ServiceRequest::StopAll => self.motors.stop_all(),
        };

        match result {
            Ok(()) => CommandReply::ok(),
            Err(e) => {
                warn!("Command failed: {}", e);
                CommandReply::failed(e)
            }
        }
    }

    /// Fetch RPMs once; `None` if either bank failed
    pub fn poll_rpms(&mut self) -> Option<RpmReport> {
        match self.motors.get_rpms() {
            Ok(samples) => {
                if self.health != RuntimeHealth::Ok {
                    info!("Telemetry recovered");
                }
                self.health = RuntimeHealth::Ok;
                Some(RpmReport::from(&samples))
            }
            Err(e) => {
                if self.health != RuntimeHealth::TelemetryFailed {
                    warn!("Telemetry poll failed: {}", e);
                }
                self.health = RuntimeHealth::TelemetryFailed;
                None
            }
        }
    }
}

fn slot(motor_num: u8) -> Result<Slot, CommandReply> {
    Slot::from_number(motor_num)
        .ok_or_else(|| CommandReply::failed(format!("Invalid motor number: {}", motor_num)))
}

/// Decode a JSON query payload; a missing payload decodes as empty input
fn decode<R: DeserializeOwned>(query: &Query) -> Result<R, serde_json::Error> {
    let payload = query.payload().map(|p| p.to_bytes()).unwrap_or_default();
    serde_json::from_slice(&payload)
}

/// Sink for one JSON service reply
trait Responder {
    async fn respond(&self, json: String) -> Result<(), BoxError>;
}

impl Responder for Query {
    async fn respond(&self, json: String) -> Result<(), BoxError> {
        self.reply(self.key_expr().clone(), json).await
    }
}

/// Answer a query. A caller that went away must not stop the service loop,
/// so failures are logged and reported as `false`.
async fn reply<R: Responder, S: Serialize>(responder: &R, body: &S) -> bool {
    let json = match serde_json::to_string(body) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to encode reply: {}", e);
            return false;
        }
    };
    match responder.respond(json).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to send reply: {}", e);
            false
        }
    }
}

/// Telemetry ticker; a tick delayed by a slow serial exchange is dropped, not replayed
fn ticker(period: Duration) -> Interval {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tick
}

pub async fn run(settings: Settings) -> Result<(), BoxError> {
    let mixer = match &settings.mixer {
        Some(path) => {
            info!("Loading mixer from {}", path.display());
            AxisMixer::from_file(path)?
        }
        None => AxisMixer::default(),
    };
    debug!("Scale table: {:?}", mixer.table());

    // Dropping the runtime stops all motors, on every exit path below
    let motors = MotorController::open(
        &settings.port,
        settings.baud_rate,
        settings.timeout(),
        mixer,
    )?;
    let mut runtime = Runtime::new(motors);

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up services and publishers...");
    let srv_set_motor = session.declare_queryable(SRV_SET_MOTOR).await?;
    let srv_set_all = session.declare_queryable(SRV_SET_ALL_MOTORS).await?;
    let srv_stop_motor = session.declare_queryable(SRV_STOP_MOTOR).await?;
    let srv_stop_all = session.declare_queryable(SRV_STOP_ALL).await?;
    let srv_enums = session.declare_queryable(SRV_MOTOR_ENUMS).await?;
    let pub_rpms = session.declare_publisher(TOPIC_RPMS).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let mut tick = ticker(settings.tick_period());
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Runtime started: {}Hz telemetry loop", settings.loop_hz);
    info!("Publishing to: {}, {}", TOPIC_RPMS, TOPIC_HEALTH);

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
        }

        // Serial calls block this task; the link has a single owner

        // 1. Drain all pending command queries
        while let Ok(Some(query)) = srv_set_motor.try_recv() {
            let response = match decode::<MotorRequest>(&query) {
                Ok(req) => runtime.handle(ServiceRequest::SetMotor(req)),
                Err(e) => CommandReply::failed(e),
            };
            reply(&query, &response).await;
        }
        while let Ok(Some(query)) = srv_set_all.try_recv() {
            let response = match decode::<MotorsRequest>(&query) {
                Ok(req) => runtime.handle(ServiceRequest::SetAllMotors(req)),
                Err(e) => CommandReply::failed(e),
            };
            reply(&query, &response).await;
        }
        while let Ok(Some(query)) = srv_stop_motor.try_recv() {
            let response = match decode::<StopMotorRequest>(&query) {
                Ok(req) => runtime.handle(ServiceRequest::StopMotor(req)),
                Err(e) => CommandReply::failed(e),
            };
            reply(&query, &response).await;
        }
        while let Ok(Some(query)) = srv_stop_all.try_recv() {
            let response = runtime.handle(ServiceRequest::StopAll);
            reply(&query, &response).await;
        }
        while let Ok(Some(query)) = srv_enums.try_recv() {
            reply(&query, &runtime.motor_enums()).await;
        }

        // 2. Poll telemetry; publish only complete sample sets
        if let Some(report) = runtime.poll_rpms() {
            pub_rpms.put(serde_json::to_string(&report)?).await?;
        }

        // 3. Publish health
        let health_json = serde_json::to_string(&runtime.health())?;
        pub_health.put(health_json).await?;
    }

    Ok(())
}
