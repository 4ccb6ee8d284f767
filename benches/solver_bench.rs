//! Criterion benchmarks for the search core
//!
//! Measures propagation-heavy chains, random 3-SAT near the phase
//! transition, and small pigeonhole instances (hard UNSAT).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use quartz_sat::{Literal, Solver};

fn lit(l: i32) -> Literal {
    Literal::from_dimacs(l)
}

/// Deterministic random 3-SAT generator (same scheme as the tests)
fn random_3sat(num_vars: u32, num_clauses: u32, seed: u64) -> Vec<Vec<i32>> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
    let mut next = || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) as u32
    };
    let mut clauses = Vec::new();
    for _ in 0..num_clauses {
        let mut clause = Vec::with_capacity(3);
        while clause.len() < 3 {
            let var = (next() % num_vars + 1) as i32;
            if clause.iter().any(|&l: &i32| l.abs() == var) {
                continue;
            }
            let sign = if next() & 1 == 0 { 1 } else { -1 };
            clause.push(sign * var);
        }
        clauses.push(clause);
    }
    clauses
}

fn solve_clauses(num_vars: usize, clauses: &[Vec<i32>]) -> quartz_sat::Status {
    let mut solver = Solver::new(num_vars);
    for c in clauses {
        let lits: Vec<Literal> = c.iter().map(|&l| lit(l)).collect();
        solver.add_clause(&lits);
    }
    solver.solve()
}

fn bench_propagation_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagation_chain");
    for n in [100u32, 1000] {
        let mut clauses = vec![vec![1]];
        for v in 1..n as i32 {
            clauses.push(vec![-v, v + 1]);
        }
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("solve", n), &clauses, |b, clauses| {
            b.iter(|| solve_clauses(black_box(n as usize), clauses))
        });
    }
    group.finish();
}

fn bench_random_3sat(c: &mut Criterion) {
    let mut group = c.benchmark_group("random_3sat");
    // Clause/variable ratio near the phase transition.
    for (num_vars, num_clauses) in [(20, 85), (50, 215), (100, 430)] {
        let clauses = random_3sat(num_vars, num_clauses, 42);
        let label = format!("{}v_{}c", num_vars, num_clauses);
        group.throughput(Throughput::Elements(num_clauses as u64));
        group.bench_with_input(BenchmarkId::new("solve", &label), &clauses, |b, clauses| {
            b.iter(|| solve_clauses(black_box(num_vars as usize), clauses))
        });
    }
    group.finish();
}

fn bench_pigeonhole(c: &mut Criterion) {
    let mut group = c.benchmark_group("pigeonhole");
    for holes in [4u32, 6] {
        let pigeons = holes + 1;
        let mut clauses: Vec<Vec<i32>> = Vec::new();
        let p = |i: u32, j: u32| (i * holes + j + 1) as i32;
        for i in 0..pigeons {
            clauses.push((0..holes).map(|j| p(i, j)).collect());
        }
        for j in 0..holes {
            for i in 0..pigeons {
                for k in (i + 1)..pigeons {
                    clauses.push(vec![-p(i, j), -p(k, j)]);
                }
            }
        }
        let num_vars = (pigeons * holes) as usize;
        group.bench_with_input(
            BenchmarkId::new("solve", format!("{}in{}", pigeons, holes)),
            &clauses,
            |b, clauses| b.iter(|| solve_clauses(black_box(num_vars), clauses)),
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_propagation_chain,
    bench_random_3sat,
    bench_pigeonhole
);
criterion_main!(benches);
