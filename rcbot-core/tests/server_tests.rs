use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use rcbot_core::{
    config::ServerConfig,
    utils::{
        camera::{producer::FrameProducer, TestPatternCamera, FRAME_LEN},
        connection::{memory_pair, Endpoint, ErrorReply, FrameHeader, MemoryPeer, PairEndpoint},
        controllers::{Action, Motor, MotorController, SimMotors, SimProbe},
        math::drive::{Direction, MotorSpeed},
        CommandServer, FrameSlot,
    },
    Result,
};

const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

struct Harness {
    peer: MemoryPeer,
    probe: SimProbe,
    slot: Arc<FrameSlot>,
    running: Arc<AtomicBool>,
    server: Option<JoinHandle<Result<()>>>,
}

impl Harness {
    /// Server on its own thread with simulated motors and one frame already
    /// published.
    fn start(pulse: Duration) -> Self {
        let (endpoint, peer) = memory_pair();
        let motors = SimMotors::new();
        let probe = motors.probe();
        let slot = Arc::new(FrameSlot::new());
        let running = Arc::new(AtomicBool::new(true));

        let mut producer = FrameProducer::new(
            TestPatternCamera::new(320, 240, 0),
            Arc::clone(&slot),
            Arc::clone(&running),
            3,
        );
        producer.capture_once().unwrap();

        let config = ServerConfig {
            pulse_duration: pulse,
            poll_timeout: Duration::from_millis(5),
            ..ServerConfig::default()
        };
        let mut server = CommandServer::new(
            endpoint,
            MotorController::new(motors),
            Arc::clone(&slot),
            Arc::clone(&running),
            &config,
        );
        let server = thread::spawn(move || server.run());

        Harness {
            peer,
            probe,
            slot,
            running,
            server: Some(server),
        }
    }

    fn request(
        &self,
        json: &str,
    ) -> (Vec<u8>, Vec<u8>) {
        self.peer.send(json).unwrap();
        self.peer.recv(REPLY_TIMEOUT).expect("no reply")
    }

    fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(server) = self.server.take() {
            server.join().unwrap().unwrap();
        }
    }
}

fn assert_frame_reply(reply: &(Vec<u8>, Vec<u8>)) -> FrameHeader {
    let header: FrameHeader = serde_json::from_slice(&reply.0).unwrap();
    assert_eq!(header.dtype, "uint8");
    assert_eq!(header.shape, vec![80, 60, 3]);
    assert_eq!(header.payload_len(), Some(reply.1.len()));
    assert_eq!(reply.1.len(), FRAME_LEN);
    header
}

#[test]
fn reset_stops_motors_and_returns_frame() {
    let harness = Harness::start(Duration::from_millis(200));
    let reply = harness.request(r#"{"command":"reset"}"#);

    assert_frame_reply(&reply);
    assert_eq!(harness.probe.signed(), (0, 0));
    assert_eq!(
        harness.slot.latest().unwrap().as_bytes(),
        reply.1.as_slice()
    );
    harness.stop();
}

#[test]
fn move_forward_pulses_then_replies() {
    let harness = Harness::start(Duration::from_millis(200));
    let sent = Instant::now();
    harness
        .peer
        .send(r#"{"command":"action","action":"move_forward"}"#)
        .unwrap();

    // Inside the hold window the motors run at 0.4 forward.
    let deadline = Instant::now() + REPLY_TIMEOUT;
    while harness.probe.history().len() < 2 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    let forward = MotorSpeed::from_normalized(0.4);
    assert_eq!(harness.probe.current(Motor::Left), forward);
    assert_eq!(harness.probe.current(Motor::Right), forward);

    let reply = harness.peer.recv(REPLY_TIMEOUT).expect("no reply");
    assert!(sent.elapsed() >= Duration::from_millis(200));
    assert_frame_reply(&reply);

    // By the time the reply arrives the motors are stopped.
    assert_eq!(harness.probe.signed(), (0, 0));
    assert_eq!(
        harness.probe.history(),
        vec![
            (Motor::Left, forward),
            (Motor::Right, forward),
            (Motor::Left, MotorSpeed::RELEASED),
            (Motor::Right, MotorSpeed::RELEASED),
        ]
    );
    harness.stop();
}

#[test]
fn reset_mid_pulse_stops_motors_early() {
    let harness = Harness::start(Duration::from_millis(600));
    harness
        .peer
        .send(r#"{"command":"action","action":"move_forward"}"#)
        .unwrap();

    let deadline = Instant::now() + REPLY_TIMEOUT;
    while harness.probe.history().len() < 2 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(harness.probe.signed(), (102, 102));

    let sent = Instant::now();
    harness.peer.send(r#"{"command":"reset"}"#).unwrap();

    // Held-back reply for move_forward first, then the reply for reset.
    let pulse_reply = harness.peer.recv(REPLY_TIMEOUT).expect("no pulse reply");
    let reset_reply = harness.peer.recv(REPLY_TIMEOUT).expect("no reset reply");
    assert!(sent.elapsed() < Duration::from_millis(400));
    assert_frame_reply(&pulse_reply);
    assert_frame_reply(&reset_reply);
    assert_eq!(harness.probe.signed(), (0, 0));

    // Nothing else arrives once the original deadline has passed.
    assert!(harness.peer.recv(Duration::from_millis(700)).is_none());
    assert_eq!(harness.probe.signed(), (0, 0));
    harness.stop();
}

#[test]
fn every_known_action_ends_stopped() {
    let harness = Harness::start(Duration::from_millis(10));
    for action in Action::ALL {
        let reply = harness.request(&format!(
            r#"{{"command":"action","action":"{}"}}"#,
            action.name()
        ));
        assert_frame_reply(&reply);
        assert_eq!(harness.probe.signed(), (0, 0), "after {}", action.name());
    }
    harness.stop();
}

#[test]
fn turn_actions_spin_wheels_in_opposite_directions() {
    let harness = Harness::start(Duration::from_millis(10));
    harness.request(r#"{"command":"action","action":"turn_left"}"#);

    let history = harness.probe.history();
    assert_eq!(history[0].0, Motor::Left);
    assert_eq!(history[0].1.direction, Direction::Backward);
    assert_eq!(history[1].0, Motor::Right);
    assert_eq!(history[1].1.direction, Direction::Forward);
    harness.stop();
}

#[test]
fn unknown_action_is_a_no_op() {
    let harness = Harness::start(Duration::from_millis(200));
    let reply = harness.request(r#"{"command":"action","action":"bogus"}"#);

    assert_frame_reply(&reply);
    assert!(harness.probe.history().is_empty());

    // Still serving afterwards.
    assert_frame_reply(&harness.request(r#"{"command":"reset"}"#));
    harness.stop();
}

#[test]
fn unknown_action_leaves_motor_state_unchanged() {
    let (endpoint, peer) = memory_pair();
    let slot = Arc::new(FrameSlot::new());
    slot.publish(rcbot_core::utils::Frame::from_bytes(1, vec![0; FRAME_LEN]).unwrap());
    let motors = SimMotors::new();
    let probe = motors.probe();
    let mut ctrl = MotorController::new(motors);
    ctrl.set_motors(0.5, -0.25).unwrap();

    let mut server = CommandServer::new(
        endpoint,
        ctrl,
        slot,
        Arc::new(AtomicBool::new(true)),
        &ServerConfig::default(),
    );
    server
        .handle_message(br#"{"command":"action","action":"spin_around"}"#)
        .unwrap();

    assert_eq!(server.motors().speeds(), (0.5, -0.25));
    assert_eq!(probe.history().len(), 2);
    assert!(peer.recv(REPLY_TIMEOUT).is_some());
}

#[test]
fn malformed_requests_get_error_replies() {
    let harness = Harness::start(Duration::from_millis(200));

    for bad in [
        r#"{"command":"launch"}"#,
        r#"{"command":"action"}"#,
        "not json at all",
    ] {
        let (header, payload) = harness.request(bad);
        let reply: ErrorReply = serde_json::from_slice(&header).unwrap();
        assert_eq!(reply.kind, "protocol", "for {bad}");
        assert!(payload.is_empty());
    }

    assert_frame_reply(&harness.request(r#"{"command":"reset"}"#));
    harness.stop();
}

#[test]
fn replies_carry_the_newest_frame() {
    let harness = Harness::start(Duration::from_millis(200));
    let first = harness.request(r#"{"command":"reset"}"#);

    let mut producer = FrameProducer::new(
        TestPatternCamera::new(320, 240, 0),
        Arc::clone(&harness.slot),
        Arc::clone(&harness.running),
        3,
    );
    // Separate producer starts its own numbering; its first frame is stale.
    assert_eq!(producer.capture_once().unwrap(), None);
    assert_eq!(producer.capture_once().unwrap(), Some(2));
    let newest = harness.slot.latest().unwrap();
    assert_eq!(newest.seq(), 2);

    let second = harness.request(r#"{"command":"reset"}"#);
    assert_ne!(first.1, second.1);
    assert_eq!(second.1.as_slice(), newest.as_bytes());
    harness.stop();
}

#[test]
fn zmq_pair_round_trip() {
    let context = zmq::Context::new();
    let address = "inproc://rcbot-server-test";
    let mut endpoint = PairEndpoint::bind_with_context(&context, address).unwrap();

    let client = context.socket(zmq::PAIR).unwrap();
    client.connect(address).unwrap();
    client.send(r#"{"command":"reset"}"#, 0).unwrap();

    let request = endpoint
        .poll_request(Duration::from_secs(2))
        .unwrap()
        .expect("request");
    assert_eq!(request, br#"{"command":"reset"}"#);

    endpoint
        .send_reply(br#"{"dtype":"uint8","shape":[2]}"#, &[7, 8])
        .unwrap();
    let parts = client.recv_multipart(0).unwrap();
    assert_eq!(parts.len(), 2);
    let header: FrameHeader = serde_json::from_slice(&parts[0]).unwrap();
    assert_eq!(header.payload_len(), Some(parts[1].len()));
}
