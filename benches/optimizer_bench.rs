use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mateq::compiler::ir::{Kind, Sequence};
use mateq::compiler::{CompileOptions, Equation, Optimizer, SourceEmitter};
use mateq::kernels::Matrix;

/// `K = P*H'*inv(H*P*H' + R)`
fn kalman(eq: &mut Equation) -> Sequence {
    let k = eq.declare("K", Kind::Matrix).unwrap();
    let p = eq.declare("P", Kind::Matrix).unwrap();
    let h = eq.declare("H", Kind::Matrix).unwrap();
    let r = eq.declare("R", Kind::Matrix).unwrap();
    let mut builder = eq.builder();
    let ht = builder.apply(|f| f.transpose(h)).unwrap();
    let pht = builder.apply(|f| f.multiply(p, ht)).unwrap();
    let hp = builder.apply(|f| f.multiply(h, p)).unwrap();
    let hpht = builder.apply(|f| f.multiply(hp, ht)).unwrap();
    let s = builder.apply(|f| f.add(hpht, r)).unwrap();
    let s_inv = builder.apply(|f| f.inv(s)).unwrap();
    let gain = builder.apply(|f| f.multiply(pht, s_inv)).unwrap();
    builder.assign(gain, k).unwrap();
    builder.finish()
}

fn optimizer_benchmark(c: &mut Criterion) {
    let mut eq = Equation::new();
    let seq = kalman(&mut eq);

    c.bench_function("optimize kalman gain", |b| {
        b.iter(|| {
            let mut seq = seq.clone();
            let mut vars = eq.vars().clone();
            let mut temps = eq.temps().clone();
            Optimizer::default()
                .optimize(
                    black_box(&mut seq),
                    &mut vars,
                    &mut temps,
                    &mut SourceEmitter::default(),
                )
                .unwrap()
        })
    });
}

fn generate_benchmark(c: &mut Criterion) {
    c.bench_function("generate kalman gain", |b| {
        b.iter(|| {
            let mut eq = Equation::new();
            let mut seq = kalman(&mut eq);
            eq.generate_function("kalman_gain", &mut seq, black_box(&CompileOptions::default()))
                .unwrap()
        })
    });
}

fn execute_benchmark(c: &mut Criterion) {
    c.bench_function("execute kalman gain 6x6", |b| {
        b.iter(|| {
            let mut eq = Equation::new();
            let mut seq = kalman(&mut eq);
            eq.alias_matrix("K", Matrix::zeros(0, 0)).unwrap();
            eq.alias_matrix("P", Matrix::identity(6, 6) * 2.0).unwrap();
            eq.alias_matrix("H", Matrix::from_fn(3, 6, |i, j| ((i + j) % 3) as f64))
                .unwrap();
            eq.alias_matrix("R", Matrix::identity(3, 3)).unwrap();
            eq.execute(black_box(&mut seq), true).unwrap()
        })
    });
}

criterion_group!(benches, optimizer_benchmark, generate_benchmark, execute_benchmark);
criterion_main!(benches);
