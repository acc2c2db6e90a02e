//! RT↔Non-RT bridge region.
//!
//! A fixed-name shared-memory region carrying two independent seqlock
//! snapshots, one per direction, plus a heartbeat timestamp per side.
//! There is exactly one well-known name: the RT process creates it and
//! unlinks the backing file immediately (the mapping stays valid for
//! every process that already opened it), the Non-RT process attaches
//! by retrying the open on a fixed cadence until the RT side is up.

use crate::error::{ShmError, ShmResult};
use crate::platform::{LinuxMemoryConfig, attach_segment_mmap, create_segment_mmap};
use memmap2::MmapMut;
use std::sync::atomic::{AtomicU64, Ordering, fence};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Attach retry cadence while waiting for the RT side to publish the region.
pub const ATTACH_RETRY_INTERVAL_MS: u64 = 100;

/// Attach retry budget before giving up (5s / 100ms).
pub const ATTACH_MAX_RETRIES: u32 = 50;

/// Snapshot published by the RT plane, consumed by the Non-RT side.
#[repr(C, align(64))]
#[derive(Debug, Clone, Copy)]
pub struct RtToNonRtSnapshot {
    /// Current high-level operating mode.
    pub robot_mode: i32,
    /// Latest estimated X position.
    pub position_x: f32,
    /// Latest estimated Y position.
    pub position_y: f32,
    /// Latest estimated velocity magnitude.
    pub velocity: f32,
    /// Monotonic timestamp of this snapshot, in nanoseconds.
    pub timestamp_ns: u64,
    /// Cumulative count of cyclic-executive deadline overruns observed
    /// by the RT side since process start.
    pub deadline_miss_count: u64,
    /// Seqlock sequence number. Even = stable, odd = write in progress.
    pub seq: u32,
    _padding: [u8; 28],
}

impl RtToNonRtSnapshot {
    const fn zeroed() -> Self {
        Self {
            robot_mode: 0,
            position_x: 0.0,
            position_y: 0.0,
            velocity: 0.0,
            timestamp_ns: 0,
            deadline_miss_count: 0,
            seq: 0,
            _padding: [0; 28],
        }
    }
}

/// Snapshot published by the Non-RT side, consumed by the RT plane.
#[repr(C, align(64))]
#[derive(Debug, Clone, Copy)]
pub struct NonRtToRtSnapshot {
    /// Commanded velocity ceiling.
    pub max_velocity: f32,
    /// Proportional gain.
    pub pid_kp: f32,
    /// Integral gain.
    pub pid_ki: f32,
    /// Derivative gain.
    pub pid_kd: f32,
    /// Monotonic timestamp of this snapshot, in nanoseconds.
    pub timestamp_ns: u64,
    /// Seqlock sequence number. Even = stable, odd = write in progress.
    pub seq: u32,
    _padding: [u8; 44],
}

impl NonRtToRtSnapshot {
    const fn zeroed() -> Self {
        Self {
            max_velocity: 0.0,
            pid_kp: 0.0,
            pid_ki: 0.0,
            pid_kd: 0.0,
            timestamp_ns: 0,
            seq: 0,
            _padding: [0; 44],
        }
    }
}

/// Layout of the mapped bridge region.
#[repr(C, align(64))]
struct BridgeLayout {
    rt_to_nonrt: RtToNonRtSnapshot,
    nonrt_to_rt: NonRtToRtSnapshot,
    rt_heartbeat_ns: AtomicU64,
    nonrt_heartbeat_ns: AtomicU64,
}

impl BridgeLayout {
    const fn zeroed() -> Self {
        Self {
            rt_to_nonrt: RtToNonRtSnapshot::zeroed(),
            nonrt_to_rt: NonRtToRtSnapshot::zeroed(),
            rt_heartbeat_ns: AtomicU64::new(0),
            nonrt_heartbeat_ns: AtomicU64::new(0),
        }
    }
}

/// Side of the bridge a process is operating as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeSide {
    /// The real-time control plane: writes `rt_to_nonrt`, reads `nonrt_to_rt`.
    Rt,
    /// The non-real-time supervisory plane: writes `nonrt_to_rt`, reads `rt_to_nonrt`.
    NonRt,
}

/// The mapped bridge region plus the role this process plays in it.
pub struct BridgeRegion {
    mmap: MmapMut,
    side: BridgeSide,
    path: String,
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64
}

fn shm_path(name: &str) -> String {
    format!("/dev/shm{}", name)
}

impl BridgeRegion {
    /// Create the bridge region as the RT side. The backing file stays
    /// linked until this side drops, so the Non-RT side can open it at
    /// any point after creation.
    pub fn create(name: &str) -> ShmResult<Self> {
        let path = shm_path(name);
        let size = std::mem::size_of::<BridgeLayout>();
        let config = LinuxMemoryConfig::default();
        let mut mmap = create_segment_mmap(&path, size, &config)?;

        {
            let layout = unsafe { &mut *(mmap.as_mut_ptr() as *mut BridgeLayout) };
            *layout = BridgeLayout::zeroed();
        }
        fence(Ordering::Release);

        Ok(Self {
            mmap,
            side: BridgeSide::Rt,
            path,
        })
    }

    /// Attach to an existing bridge region as the Non-RT side, retrying
    /// on a fixed cadence until the RT side has published it or the
    /// retry budget is exhausted.
    pub fn attach(name: &str) -> ShmResult<Self> {
        let path = shm_path(name);
        let mut attempts = 0;

        loop {
            match attach_segment_mmap(&path) {
                Ok(mmap) => {
                    return Ok(Self {
                        mmap,
                        side: BridgeSide::NonRt,
                        path,
                    });
                }
                Err(_) if attempts < ATTACH_MAX_RETRIES => {
                    attempts += 1;
                    std::thread::sleep(Duration::from_millis(ATTACH_RETRY_INTERVAL_MS));
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn layout(&self) -> &BridgeLayout {
        unsafe { &*(self.mmap.as_ptr() as *const BridgeLayout) }
    }

    fn layout_mut(&mut self) -> &mut BridgeLayout {
        unsafe { &mut *(self.mmap.as_mut_ptr() as *mut BridgeLayout) }
    }

    /// The side of the bridge this region was opened as.
    pub fn side(&self) -> BridgeSide {
        self.side
    }

    /// Publish a new RT→Non-RT snapshot under the seqlock protocol.
    /// Only meaningful when `side() == BridgeSide::Rt`.
    pub fn publish_rt_snapshot(&mut self, f: impl FnOnce(&mut RtToNonRtSnapshot)) {
        let now = now_ns();
        let layout = self.layout_mut();
        let snap = &mut layout.rt_to_nonrt;

        snap.seq = snap.seq.wrapping_add(1);
        fence(Ordering::Release);
        f(snap);
        snap.timestamp_ns = now;
        fence(Ordering::Release);
        snap.seq = snap.seq.wrapping_add(1);

        layout.rt_heartbeat_ns.store(now, Ordering::Release);
    }

    /// Publish a new Non-RT→RT snapshot under the seqlock protocol.
    /// Only meaningful when `side() == BridgeSide::NonRt`.
    pub fn publish_nonrt_snapshot(&mut self, f: impl FnOnce(&mut NonRtToRtSnapshot)) {
        let now = now_ns();
        let layout = self.layout_mut();
        let snap = &mut layout.nonrt_to_rt;

        snap.seq = snap.seq.wrapping_add(1);
        fence(Ordering::Release);
        f(snap);
        snap.timestamp_ns = now;
        fence(Ordering::Release);
        snap.seq = snap.seq.wrapping_add(1);

        layout.nonrt_heartbeat_ns.store(now, Ordering::Release);
    }

    /// Read the RT→Non-RT snapshot, retrying on torn reads up to
    /// `vantage_common::consts::MAX_READ_RETRIES` times.
    pub fn read_rt_snapshot(&self) -> ShmResult<RtToNonRtSnapshot> {
        self.read_with_retry(|layout| &layout.rt_to_nonrt)
    }

    /// Read the Non-RT→RT snapshot, retrying on torn reads.
    pub fn read_nonrt_snapshot(&self) -> ShmResult<NonRtToRtSnapshot> {
        self.read_with_retry(|layout| &layout.nonrt_to_rt)
    }

    fn read_with_retry<T: Copy>(
        &self,
        select: impl Fn(&BridgeLayout) -> &T,
    ) -> ShmResult<T>
    where
        T: SeqlockSnapshot,
    {
        let layout = self.layout();
        for _ in 0..vantage_common::consts::MAX_READ_RETRIES {
            let snap = select(layout);
            let before = snap.seq_field();
            if before % 2 != 0 {
                continue;
            }
            fence(Ordering::Acquire);
            let copy = *snap;
            fence(Ordering::Acquire);
            let after = select(layout).seq_field();
            if before == after {
                return Ok(copy);
            }
        }
        Err(ShmError::VersionConflict)
    }

    /// Whether the peer's heartbeat is within the timeout, as of now.
    pub fn peer_alive(&self, timeout_ns: u64) -> bool {
        let layout = self.layout();
        let peer_ts = match self.side {
            BridgeSide::Rt => layout.nonrt_heartbeat_ns.load(Ordering::Acquire),
            BridgeSide::NonRt => layout.rt_heartbeat_ns.load(Ordering::Acquire),
        };
        if peer_ts == 0 {
            return false;
        }
        now_ns().saturating_sub(peer_ts) < timeout_ns
    }
}

trait SeqlockSnapshot: Copy {
    fn seq_field(&self) -> u32;
}

impl SeqlockSnapshot for RtToNonRtSnapshot {
    fn seq_field(&self) -> u32 {
        self.seq
    }
}

impl SeqlockSnapshot for NonRtToRtSnapshot {
    fn seq_field(&self) -> u32 {
        self.seq
    }
}

impl Drop for BridgeRegion {
    fn drop(&mut self) {
        if self.side == BridgeSide::Rt {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_name(tag: &str) -> String {
        format!("/vantage_bridge_test_{}_{}", tag, std::process::id())
    }

    #[test]
    fn create_then_attach_round_trips_rt_snapshot() {
        let name = unique_name("roundtrip");
        let mut rt = BridgeRegion::create(&name).unwrap();
        rt.publish_rt_snapshot(|s| {
            s.robot_mode = 2;
            s.position_x = 1.5;
        });

        let nonrt = BridgeRegion::attach(&name).unwrap();
        let snap = nonrt.read_rt_snapshot().unwrap();
        assert_eq!(snap.robot_mode, 2);
        assert_eq!(snap.position_x, 1.5);
    }

    #[test]
    fn nonrt_to_rt_snapshot_round_trips() {
        let name = unique_name("nonrt_to_rt");
        let rt = BridgeRegion::create(&name).unwrap();
        let mut nonrt = BridgeRegion::attach(&name).unwrap();

        nonrt.publish_nonrt_snapshot(|s| {
            s.max_velocity = 3.0;
            s.pid_kp = 0.5;
        });

        let snap = rt.read_nonrt_snapshot().unwrap();
        assert_eq!(snap.max_velocity, 3.0);
        assert_eq!(snap.pid_kp, 0.5);
    }

    #[test]
    fn heartbeat_reflects_recent_publish() {
        let name = unique_name("heartbeat");
        let mut rt = BridgeRegion::create(&name).unwrap();
        let nonrt = BridgeRegion::attach(&name).unwrap();

        assert!(!nonrt.peer_alive(crate::bridge::ATTACH_RETRY_INTERVAL_MS * 1_000_000));

        rt.publish_rt_snapshot(|s| s.robot_mode = 1);
        assert!(nonrt.peer_alive(5_000_000_000));
    }

    #[test]
    fn attach_without_creator_fails() {
        let name = unique_name("missing");
        let path = shm_path(&name);
        assert!(!std::path::Path::new(&path).exists());
        let err = attach_segment_mmap(&path);
        assert!(err.is_err());
    }
}
