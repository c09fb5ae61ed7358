//! Property tests: random request sequences checked against a reference model
//! of the dependency graph.

mod common;

use common::{Disk, Network, Vm, call, engine, masters};
use proptest::prelude::*;
use provision_engine::{EngineError, Payload, Response, Void};
use std::collections::BTreeSet;

const VMS: usize = 3;
const DISKS: usize = 3;
const NETWORKS: usize = 2;

#[derive(Debug, Clone)]
enum Op {
    CreateDisk(usize, u64),
    DeleteDisk(usize),
    AddDisk(usize, usize),
    DelDisk(usize, usize),
    Connect(usize, usize),
    Disconnect(usize, usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..DISKS, 1..4096u64).prop_map(|(d, size)| Op::CreateDisk(d, size)),
        (0..DISKS).prop_map(Op::DeleteDisk),
        (0..VMS, 0..DISKS).prop_map(|(v, d)| Op::AddDisk(v, d)),
        (0..VMS, 0..DISKS).prop_map(|(v, d)| Op::DelDisk(v, d)),
        (0..VMS, 0..NETWORKS).prop_map(|(v, n)| Op::Connect(v, n)),
        (0..VMS, 0..NETWORKS).prop_map(|(v, n)| Op::Disconnect(v, n)),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Ok,
    Exists,
    Missing,
    InUse,
}

fn outcome(result: &Result<Response, EngineError>) -> Outcome {
    match result {
        Ok(_) => Outcome::Ok,
        Err(EngineError::ObjectExists(_)) => Outcome::Exists,
        Err(EngineError::ObjectDoesNotExist(_)) => Outcome::Missing,
        Err(EngineError::ObjectInUse(_)) => Outcome::InUse,
        Err(err) => panic!("unexpected error: {err}"),
    }
}

#[derive(Debug, Default)]
struct Model {
    disks: [Option<Option<usize>>; DISKS],
    networks: [BTreeSet<usize>; NETWORKS],
}

impl Model {
    /// Applies `op` and returns the outcome the engine must report.
    fn apply(&mut self, op: &Op) -> Outcome {
        match *op {
            Op::CreateDisk(d, _) => match self.disks[d] {
                Some(_) => Outcome::Exists,
                None => {
                    self.disks[d] = Some(None);
                    Outcome::Ok
                }
            },
            Op::DeleteDisk(d) => match self.disks[d] {
                None => Outcome::Missing,
                Some(Some(_)) => Outcome::InUse,
                Some(None) => {
                    self.disks[d] = None;
                    Outcome::Ok
                }
            },
            Op::AddDisk(v, d) => match self.disks[d] {
                None => Outcome::Missing,
                Some(Some(owner)) if owner != v => Outcome::InUse,
                Some(_) => {
                    self.disks[d] = Some(Some(v));
                    Outcome::Ok
                }
            },
            Op::DelDisk(v, d) => match self.disks[d] {
                None => Outcome::Missing,
                Some(owner) => {
                    if owner == Some(v) {
                        self.disks[d] = Some(None);
                    }
                    Outcome::Ok
                }
            },
            Op::Connect(v, n) => {
                self.networks[n].insert(v);
                Outcome::Ok
            }
            Op::Disconnect(v, n) => {
                self.networks[n].remove(&v);
                Outcome::Ok
            }
        }
    }
}

fn vm(i: usize) -> String {
    format!("vm{i}")
}

fn disk(i: usize) -> String {
    format!("disk{i}")
}

fn network(i: usize) -> String {
    format!("net{i}")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// After every request, the reported outcome and every persisted
    /// masters set must match the model.
    #[test]
    fn prop_dependency_graph_matches_model(ops in prop::collection::vec(arb_op(), 1..40)) {
        let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
        rt.block_on(async {
            let (engine, store) = engine();
            for v in 0..VMS {
                call(&engine, "VM", "create", &vm(v), Void).await.expect("create vm");
            }
            for n in 0..NETWORKS {
                call(&engine, "Network", "create", &network(n), "10.0.0.0/16")
                    .await
                    .expect("create network");
            }

            let mut model = Model::default();
            for op in &ops {
                let result = match *op {
                    Op::CreateDisk(d, size) => call(&engine, "Disk", "create", &disk(d), size).await,
                    Op::DeleteDisk(d) => call(&engine, "Disk", "delete", &disk(d), Void).await,
                    Op::AddDisk(v, d) => call(&engine, "VM", "add-disk", &vm(v), disk(d)).await,
                    Op::DelDisk(v, d) => call(&engine, "VM", "del-disk", &vm(v), disk(d)).await,
                    Op::Connect(v, n) => call(&engine, "VM", "connect", &vm(v), network(n)).await,
                    Op::Disconnect(v, n) => {
                        call(&engine, "VM", "disconnect", &vm(v), network(n)).await
                    }
                };
                prop_assert_eq!(outcome(&result), model.apply(op), "{:?}", op);

                for (d, state) in model.disks.iter().enumerate() {
                    if let Some(owner) = state {
                        let expected: Vec<String> = owner.iter().map(|&v| vm(v)).collect();
                        prop_assert_eq!(masters(&store, &disk(d)), expected);
                    }
                }
                for (n, users) in model.networks.iter().enumerate() {
                    let expected: Vec<String> = users.iter().map(|&v| vm(v)).collect();
                    prop_assert_eq!(masters(&store, &network(n)), expected);
                }
            }
            prop_assert!(engine.guards().is_empty());
            Ok(())
        })?;
    }
}

fn arb_ids() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{1,8}[0-9]{0,3}", 0..6)
}

proptest! {
    /// Persisted payloads decode back to the value that was stored.
    #[test]
    fn prop_resource_payloads_round_trip(
        size in any::<u64>(),
        path in "/dev/[a-z0-9]{1,12}",
        disks in arb_ids(),
        networks in arb_ids(),
        cidr in "[0-9.]{7,15}/[0-9]{1,2}",
        peers in arb_ids(),
    ) {
        let disk = Disk { path, size };
        prop_assert_eq!(Payload::encode(&disk).unwrap().decode::<Disk>().unwrap(), disk);

        let vm = Vm { disks, networks };
        prop_assert_eq!(Payload::encode(&vm).unwrap().decode::<Vm>().unwrap(), vm);

        let network = Network { cidr, peers };
        prop_assert_eq!(
            Payload::encode(&network).unwrap().decode::<Network>().unwrap(),
            network
        );
    }
}
