use crate::traits::{DynamicalSystem, Scalar, Steppable};

/// Classic Runge-Kutta 4th Order Solver
pub struct RK4<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> RK4<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::zero();
        Self {
            k1: vec![z; dim],
            k2: vec![z; dim],
            k3: vec![z; dim],
            k4: vec![z; dim],
            tmp: vec![z; dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for RK4<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        let half = T::from_f64(0.5).unwrap();
        let sixth = T::from_f64(1.0 / 6.0).unwrap();
        let two = T::from_f64(2.0).unwrap();

        let t0 = *t;

        // k1 = f(t, y)
        system.apply(t0, state, &mut self.k1);

        // k2 = f(t + dt/2, y + dt*k1/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k1[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k2);

        // k3 = f(t + dt/2, y + dt*k2/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k2[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k3);

        // k4 = f(t + dt, y + dt*k3)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k3[i];
        }
        system.apply(t0 + dt, &self.tmp, &mut self.k4);

        // y_next = y + dt/6 * (k1 + 2k2 + 2k3 + k4)
        for i in 0..state.len() {
            state[i] = state[i]
                + dt * sixth * (self.k1[i] + two * self.k2[i] + two * self.k3[i] + self.k4[i]);
        }

        *t = t0 + dt;
    }
}

// Dormand–Prince 5(4) tableau.
const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

// 5th-order weights; also the last stage row (FSAL).
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// y5 - y4
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

// Shampine's continuous extension. Row `j` holds the coefficients of
// theta, theta^2, theta^3, theta^4 multiplying stage `k(j+1)`.
const DENSE: [[f64; 4]; 7] = [
    [
        1.0,
        -8048581381.0 / 2820520608.0,
        8663915743.0 / 2820520608.0,
        -12715105075.0 / 11282082432.0,
    ],
    [0.0, 0.0, 0.0, 0.0],
    [
        0.0,
        131558114200.0 / 32700410799.0,
        -68118460800.0 / 10900136933.0,
        87487479700.0 / 32700410799.0,
    ],
    [
        0.0,
        -1754552775.0 / 470086768.0,
        14199869525.0 / 1410260304.0,
        -10690763975.0 / 1880347072.0,
    ],
    [
        0.0,
        127303824393.0 / 49829197408.0,
        -318862633887.0 / 49829197408.0,
        701980252875.0 / 199316789632.0,
    ],
    [
        0.0,
        -282668133.0 / 205662961.0,
        2019193451.0 / 616988883.0,
        -1453857185.0 / 822651844.0,
    ],
    [
        0.0,
        40617522.0 / 29380423.0,
        -110615467.0 / 29380423.0,
        69997945.0 / 29380423.0,
    ],
];

/// Dormand–Prince 5(4) embedded pair.
///
/// The adaptive driver uses [`DormandPrince45::prime`], [`DormandPrince45::attempt`]
/// and [`DormandPrince45::accept`]; the [`Steppable`] impl takes a plain
/// fixed-size 5th-order step.
pub struct DormandPrince45<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    k5: Vec<T>,
    k6: Vec<T>,
    k7: Vec<T>,
    tmp: Vec<T>,
    candidate: Vec<T>,
    evaluations: usize,
}

impl<T: Scalar> DormandPrince45<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::zero();
        Self {
            k1: vec![z; dim],
            k2: vec![z; dim],
            k3: vec![z; dim],
            k4: vec![z; dim],
            k5: vec![z; dim],
            k6: vec![z; dim],
            k7: vec![z; dim],
            tmp: vec![z; dim],
            candidate: vec![z; dim],
            evaluations: 0,
        }
    }

    /// Evaluates `f(t, state)` into the first stage. Must be called before the
    /// first [`attempt`](Self::attempt) and whenever the state is replaced
    /// from outside.
    pub fn prime(&mut self, system: &impl DynamicalSystem<T>, t: T, state: &[T]) {
        system.apply(t, state, &mut self.k1);
        self.evaluations += 1;
    }

    /// Derivative at the current (last accepted or primed) point.
    pub fn slope(&self) -> &[T] {
        &self.k1
    }

    /// State at the end of the last attempted step.
    pub fn candidate(&self) -> &[T] {
        &self.candidate
    }

    /// Number of right-hand-side evaluations performed so far.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// Computes a trial step of size `dt` from `(t, state)` and returns the
    /// RMS error norm scaled by `atol + rtol * max(|y|, |y_new|)`.
    /// A norm `<= 1` means the step meets the tolerances.
    pub fn attempt(
        &mut self,
        system: &impl DynamicalSystem<T>,
        t: T,
        state: &[T],
        dt: T,
        rtol: T,
        atol: T,
    ) -> T {
        self.stages(system, t, state, dt);

        system.apply(t + dt, &self.candidate, &mut self.k7);
        self.evaluations += 1;

        let (e1, e3, e4, e5, e6, e7) = (
            cast::<T>(E1),
            cast::<T>(E3),
            cast::<T>(E4),
            cast::<T>(E5),
            cast::<T>(E6),
            cast::<T>(E7),
        );
        let mut sum = T::zero();
        for i in 0..state.len() {
            let err = dt
                * (e1 * self.k1[i]
                    + e3 * self.k3[i]
                    + e4 * self.k4[i]
                    + e5 * self.k5[i]
                    + e6 * self.k6[i]
                    + e7 * self.k7[i]);
            let scale = atol + rtol * state[i].abs().max(self.candidate[i].abs());
            let ratio = err / scale;
            sum = sum + ratio * ratio;
        }
        (sum / cast::<T>(state.len() as f64)).sqrt()
    }

    /// Fourth-order dense output of the last attempted step `(state, dt)` at
    /// `t + theta * dt`, `theta` in `[0, 1]`. Only valid before [`accept`](Self::accept).
    pub fn interpolate(&self, state: &[T], dt: T, theta: T, out: &mut [T]) {
        let mut weights = [T::zero(); 7];
        for (w, row) in weights.iter_mut().zip(DENSE.iter()) {
            let mut power = theta;
            for &c in row {
                *w = *w + cast::<T>(c) * power;
                power = power * theta;
            }
        }
        let stages = [
            &self.k1, &self.k2, &self.k3, &self.k4, &self.k5, &self.k6, &self.k7,
        ];
        for i in 0..out.len() {
            let mut acc = T::zero();
            for (w, k) in weights.iter().zip(stages.iter()) {
                acc = acc + *w * k[i];
            }
            out[i] = state[i] + dt * acc;
        }
    }

    /// Commits the last attempted step into `state`; the end-point derivative
    /// becomes the next step's first stage.
    pub fn accept(&mut self, state: &mut [T]) {
        state.copy_from_slice(&self.candidate);
        std::mem::swap(&mut self.k1, &mut self.k7);
    }

    fn stages(&mut self, system: &impl DynamicalSystem<T>, t: T, state: &[T], dt: T) {
        let n = state.len();

        let a21 = cast::<T>(A21);
        for i in 0..n {
            self.tmp[i] = state[i] + dt * a21 * self.k1[i];
        }
        system.apply(t + cast::<T>(C2) * dt, &self.tmp, &mut self.k2);

        let (a31, a32) = (cast::<T>(A31), cast::<T>(A32));
        for i in 0..n {
            self.tmp[i] = state[i] + dt * (a31 * self.k1[i] + a32 * self.k2[i]);
        }
        system.apply(t + cast::<T>(C3) * dt, &self.tmp, &mut self.k3);

        let (a41, a42, a43) = (cast::<T>(A41), cast::<T>(A42), cast::<T>(A43));
        for i in 0..n {
            self.tmp[i] =
                state[i] + dt * (a41 * self.k1[i] + a42 * self.k2[i] + a43 * self.k3[i]);
        }
        system.apply(t + cast::<T>(C4) * dt, &self.tmp, &mut self.k4);

        let (a51, a52, a53, a54) = (
            cast::<T>(A51),
            cast::<T>(A52),
            cast::<T>(A53),
            cast::<T>(A54),
        );
        for i in 0..n {
            self.tmp[i] = state[i]
                + dt * (a51 * self.k1[i] + a52 * self.k2[i] + a53 * self.k3[i] + a54 * self.k4[i]);
        }
        system.apply(t + cast::<T>(C5) * dt, &self.tmp, &mut self.k5);

        let (a61, a62, a63, a64, a65) = (
            cast::<T>(A61),
            cast::<T>(A62),
            cast::<T>(A63),
            cast::<T>(A64),
            cast::<T>(A65),
        );
        for i in 0..n {
            self.tmp[i] = state[i]
                + dt * (a61 * self.k1[i]
                    + a62 * self.k2[i]
                    + a63 * self.k3[i]
                    + a64 * self.k4[i]
                    + a65 * self.k5[i]);
        }
        system.apply(t + dt, &self.tmp, &mut self.k6);

        let (b1, b3, b4, b5, b6) = (
            cast::<T>(B1),
            cast::<T>(B3),
            cast::<T>(B4),
            cast::<T>(B5),
            cast::<T>(B6),
        );
        for i in 0..n {
            self.candidate[i] = state[i]
                + dt * (b1 * self.k1[i]
                    + b3 * self.k3[i]
                    + b4 * self.k4[i]
                    + b5 * self.k5[i]
                    + b6 * self.k6[i]);
        }
        self.evaluations += 5;
    }
}

impl<T: Scalar> Steppable<T> for DormandPrince45<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        let t0 = *t;
        self.prime(system, t0, state);
        self.stages(system, t0, state, dt);
        state.copy_from_slice(&self.candidate);
        *t = t0 + dt;
    }
}

fn cast<T: Scalar>(value: f64) -> T {
    T::from_f64(value).unwrap()
}
