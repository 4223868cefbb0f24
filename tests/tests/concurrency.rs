use gwcore_tests::framework::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

const THREADS: u32 = 8;
const SESSIONS_PER_THREAD: u32 = 200;

#[test]
fn concurrent_creation_assigns_unique_identifiers() -> anyhow::Result<()> {
    let f = init()?;

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let cp = f.control_plane.clone();
            thread::spawn(move || {
                let mut ids = vec![];
                for ii in 0..SESSIONS_PER_THREAD {
                    let pdn = cp.create_pdn_connection(APN, SGW_ADDR, t * 1000 + ii).unwrap();
                    let default = cp.create_bearer(&pdn, 1).unwrap();
                    let dedicated = cp.create_bearer(&pdn, 2).unwrap();
                    ids.push((pdn.cp_teid(), pdn.ue_ip(), default.dp_teid(), dedicated.dp_teid()));
                }
                ids
            })
        })
        .collect();

    let mut cp_teids = HashSet::new();
    let mut ue_ips = HashSet::new();
    let mut dp_teids = HashSet::new();
    for handle in handles {
        for (cp_teid, ue_ip, default, dedicated) in handle.join().unwrap() {
            assert!(cp_teids.insert(cp_teid));
            assert!(ue_ips.insert(ue_ip));
            assert!(dp_teids.insert(default));
            assert!(dp_teids.insert(dedicated));
        }
    }

    let total = (THREADS * SESSIONS_PER_THREAD) as usize;
    assert_eq!(cp_teids.len(), total);
    assert_eq!(dp_teids.len(), total * 2);

    // Plus the fixture's own session.
    assert_eq!(f.control_plane.pdn_count(), total + 1);
    assert_eq!(f.control_plane.bearer_count(), total * 2 + 2);
    Ok(())
}

#[test]
fn forwarding_while_sessions_churn() -> anyhow::Result<()> {
    let f = init()?;
    let f = Arc::new(f);

    // One thread keeps creating and deleting sessions while others forward on the fixture's
    // bearers, which must never be disturbed.
    let churn = {
        let cp = f.control_plane.clone();
        thread::spawn(move || {
            for ii in 0..500 {
                let pdn = cp.create_pdn_connection(APN, SGW_ADDR, ii).unwrap();
                let bearer = cp.create_bearer(&pdn, ii).unwrap();
                pdn.set_default_bearer(&bearer).unwrap();
                cp.delete_pdn_connection(pdn.cp_teid());
            }
        })
    };

    let forwarders: Vec<_> = (0..4)
        .map(|_| {
            let f = f.clone();
            thread::spawn(move || {
                for _ in 0..250 {
                    f.data_plane.handle_uplink(f.default_bearer.dp_teid(), vec![1]);
                    f.data_plane.handle_downlink(f.pdn.ue_ip(), vec![2]);
                }
            })
        })
        .collect();

    churn.join().unwrap();
    for forwarder in forwarders {
        forwarder.join().unwrap();
    }

    assert_eq!(f.sink.to_apn(APN_GW).len(), 1000);
    assert_eq!(
        f.sink.to_sgw(SGW_ADDR, SGW_DEFAULT_BEARER_TEID).len(),
        1000
    );
    assert_eq!(f.control_plane.pdn_count(), 1);
    assert_eq!(f.control_plane.bearer_count(), 2);
    Ok(())
}

#[test]
fn concurrent_rate_checks_share_one_bucket() -> anyhow::Result<()> {
    let f = Arc::new(init()?);
    // 100 packets of 100 bytes fit in the bucket.
    f.default_bearer.set_uplink_rate(80_000);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let f = f.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    f.data_plane.handle_uplink(f.default_bearer.dp_teid(), vec![0; 100]);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // A few extra may be earned by refill while the threads run.
    let forwarded = f.sink.to_apn(APN_GW).len();
    assert!((100..=110).contains(&forwarded), "forwarded {forwarded}");
    Ok(())
}
