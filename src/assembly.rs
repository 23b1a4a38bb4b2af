//! Global assembly
//!
//! Numbers the DOFs, builds the element kernels once, assembles the global
//! sparse stiffness and mass, and turns each load case into a full-size load
//! vector plus the per-element fixed-end reactions needed for recovery.
//!
//! Fixed DOFs are eliminated by partitioning, never penalized. Springs are
//! added to the diagonal before the partition.

use std::collections::BTreeMap;

use nalgebra_sparse::CsrMatrix;

use crate::elements::{Dof, DofCondition, ElementType};
use crate::error::{DofLabel, SolverError, SolverResult};
use crate::loads::Load;
use crate::math::fer::{fer_line_load, fer_point_load, fer_truss_line_load, fer_truss_point_load, local_components};
use crate::math::shell::{
    shell_body_force_fer, shell_local_stiffness, shell_lumped_mass, shell_pressure_fer, shell_resultants,
    ShellGeometry, ShellResultants,
};
use crate::math::sparse::extract_submatrix;
use crate::math::{
    apply_fer_releases, apply_releases, asymmetry, block_transformation, member_consistent_mass,
    member_geometric_stiffness, member_local_stiffness, reverse_cuthill_mckee, truss_consistent_mass,
    truss_geometric_stiffness, truss_local_stiffness, FrameProperties, Mat12, Mat24, Mat3, SparseMatrixBuilder,
    Vec12, Vec24, Vector,
};
use crate::validation::{ElementShape, ResolvedElement, ValidatedModel};

/// Mapping between (node, DOF) pairs and global equation numbers
///
/// Nodes start in name order and are renumbered by reverse Cuthill-McKee on
/// the element connectivity graph, which keeps the skyline profile small.
/// Both steps are deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct DofMap {
    order: Vec<String>,
    position: BTreeMap<String, usize>,
}

impl DofMap {
    pub fn new(validated: &ValidatedModel) -> Self {
        let names: Vec<&String> = validated.model().nodes.keys().collect();
        let index: BTreeMap<&str, usize> = names.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();

        let mut adjacency = vec![Vec::new(); names.len()];
        for element in validated.elements().values() {
            let ids: Vec<usize> = element
                .element
                .nodes
                .iter()
                .filter_map(|n| index.get(n.as_str()).copied())
                .collect();
            for &a in &ids {
                adjacency[a].extend(ids.iter().copied().filter(|&b| b != a));
            }
        }

        let order: Vec<String> = reverse_cuthill_mckee(&adjacency)
            .into_iter()
            .map(|i| names[i].clone())
            .collect();
        let position = order.iter().enumerate().map(|(p, n)| (n.clone(), p)).collect();

        Self { order, position }
    }

    /// Total number of DOFs (6 per node)
    pub fn size(&self) -> usize {
        6 * self.order.len()
    }

    /// Nodes in equation order
    pub fn nodes(&self) -> &[String] {
        &self.order
    }

    pub fn index(&self, node: &str, dof: Dof) -> Option<usize> {
        self.position.get(node).map(|p| 6 * p + dof.index())
    }

    /// Node and DOF behind an equation number
    pub fn label(&self, index: usize) -> DofLabel {
        let node = self.order.get(index / 6).map(String::as_str).unwrap_or("?");
        let dof = Dof::from_index(index % 6).unwrap_or(Dof::DX);
        DofLabel::new(node, dof)
    }

    /// The six values of a node in a full-size vector
    pub fn node_values(&self, node: &str, v: &Vector) -> [f64; 6] {
        let mut out = [0.0; 6];
        if let Some(&p) = self.position.get(node) {
            for (k, o) in out.iter_mut().enumerate() {
                *o = v[6 * p + k];
            }
        }
        out
    }

    fn element_dofs<const N: usize>(&self, nodes: &[String]) -> [usize; N] {
        let mut dofs = [0; N];
        for (n, node) in nodes.iter().enumerate().take(N / 6) {
            let base = self.position.get(node).map(|p| 6 * p).unwrap_or(0);
            for k in 0..6 {
                dofs[6 * n + k] = base + k;
            }
        }
        dofs
    }
}

/// Whether a DOF is solved for or prescribed, with its reduced position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DofStatus {
    Free(usize),
    Fixed(usize),
}

/// Free/fixed split of the DOFs with prescribed values and springs
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    status: Vec<DofStatus>,
    free: Vec<usize>,
    fixed: Vec<usize>,
    /// Prescribed displacement per fixed DOF, in `fixed` order
    enforced: Vector,
    springs: BTreeMap<usize, f64>,
    inactive: Vec<bool>,
}

impl Partition {
    fn new(validated: &ValidatedModel, dof_map: &DofMap) -> Self {
        let n = dof_map.size();
        let mut fixed_flags = vec![false; n];
        let mut prescribed = vec![0.0; n];
        let mut springs = BTreeMap::new();
        let mut inactive = vec![false; n];

        for (node, support) in &validated.model().supports {
            for dof in Dof::ALL {
                let Some(i) = dof_map.index(node, dof) else { continue };
                match support.condition(dof) {
                    DofCondition::Fixed(value) => {
                        fixed_flags[i] = true;
                        prescribed[i] = value;
                    }
                    DofCondition::Spring(k) => {
                        springs.insert(i, k);
                    }
                    DofCondition::Free => {}
                }
            }
        }

        // Truss-only nodes have no rotational stiffness
        for node in dof_map.nodes().iter().filter(|n| validated.is_truss_only(n)) {
            for dof in [Dof::RX, Dof::RY, Dof::RZ] {
                if let Some(i) = dof_map.index(node, dof) {
                    inactive[i] = true;
                    fixed_flags[i] = true;
                    prescribed[i] = 0.0;
                    springs.remove(&i);
                }
            }
        }

        let mut status = Vec::with_capacity(n);
        let mut free = Vec::new();
        let mut fixed = Vec::new();
        for (i, &is_fixed) in fixed_flags.iter().enumerate() {
            if is_fixed {
                status.push(DofStatus::Fixed(fixed.len()));
                fixed.push(i);
            } else {
                status.push(DofStatus::Free(free.len()));
                free.push(i);
            }
        }
        let enforced = Vector::from_iterator(fixed.len(), fixed.iter().map(|&i| prescribed[i]));

        Self {
            status,
            free,
            fixed,
            enforced,
            springs,
            inactive,
        }
    }

    pub fn status(&self, index: usize) -> DofStatus {
        self.status[index]
    }

    /// Free DOFs in equation order
    pub fn free(&self) -> &[usize] {
        &self.free
    }

    pub fn fixed(&self) -> &[usize] {
        &self.fixed
    }

    pub fn num_free(&self) -> usize {
        self.free.len()
    }

    /// Prescribed displacements of the fixed DOFs
    pub fn enforced(&self) -> &Vector {
        &self.enforced
    }

    pub fn spring(&self, index: usize) -> Option<f64> {
        self.springs.get(&index).copied()
    }

    /// Rotations of truss-only nodes: restrained, never reported
    pub fn is_inactive(&self, index: usize) -> bool {
        self.inactive[index]
    }

    /// Free-DOF entries of a full-size vector
    pub fn gather_free(&self, v: &Vector) -> Vector {
        Vector::from_iterator(self.free.len(), self.free.iter().map(|&i| v[i]))
    }

    /// Full-size displacement vector from free values and the prescribed ones
    pub fn scatter(&self, u_free: &Vector) -> Vector {
        self.scatter_with(u_free, &self.enforced)
    }

    pub fn scatter_with(&self, u_free: &Vector, u_fixed: &Vector) -> Vector {
        let mut u = Vector::zeros(self.status.len());
        for (k, &i) in self.free.iter().enumerate() {
            u[i] = u_free[k];
        }
        for (k, &i) in self.fixed.iter().enumerate() {
            u[i] = u_fixed[k];
        }
        u
    }
}

/// Truss or beam-column kernel in local and global form
#[derive(Debug, Clone)]
pub struct FrameKernel {
    pub name: String,
    pub kind: ElementType,
    pub dofs: [usize; 12],
    pub props: FrameProperties,
    pub length: f64,
    pub rotation: Mat3,
    pub transformation: Mat12,
    pub releases: [bool; 12],
    /// Local stiffness before condensation of the end releases
    k_raw: Mat12,
    /// Local stiffness with the end releases condensed out
    pub k_local: Mat12,
    pub m_local: Mat12,
}

impl FrameKernel {
    fn new(resolved: &ResolvedElement, dofs: [usize; 12], length: f64, rotation: Mat3) -> Self {
        let props = FrameProperties::new(&resolved.material, &resolved.section);
        let (k_raw, m_local, releases) = match resolved.kind() {
            ElementType::Truss => (
                truss_local_stiffness(props.e, props.a, length),
                truss_consistent_mass(props.rho, props.a, length),
                [false; 12],
            ),
            _ => (
                member_local_stiffness(&props, length),
                member_consistent_mass(&props, length),
                resolved.element.releases.as_array(),
            ),
        };
        let k_local = apply_releases(&k_raw, &releases);

        Self {
            name: resolved.name.clone(),
            kind: resolved.kind(),
            dofs,
            props,
            length,
            rotation,
            transformation: block_transformation::<12>(&rotation),
            releases,
            k_raw,
            k_local,
            m_local,
        }
    }

    pub fn global_stiffness(&self) -> Mat12 {
        self.transformation.transpose() * self.k_local * self.transformation
    }

    pub fn global_mass(&self) -> Mat12 {
        self.transformation.transpose() * self.m_local * self.transformation
    }

    /// Local geometric stiffness for axial force `p` (tension positive)
    ///
    /// For a released element this is the change in the condensed stiffness,
    /// so released rows and columns stay zero.
    pub fn local_geometric(&self, p: f64) -> Mat12 {
        let kg = match self.kind {
            ElementType::Truss => truss_geometric_stiffness(p, self.length),
            _ => member_geometric_stiffness(p, self.props.a, self.props.iy, self.props.iz, self.length),
        };
        if self.releases.iter().any(|&r| r) {
            apply_releases(&(self.k_raw + kg), &self.releases) - self.k_local
        } else {
            kg
        }
    }

    pub fn global_geometric(&self, p: f64) -> Mat12 {
        self.transformation.transpose() * self.local_geometric(p) * self.transformation
    }

    /// Shear flexibility ratio of the bending plane loaded along local axis `direction`
    pub fn shear_ratio(&self, direction: usize) -> f64 {
        self.props.bending_shear_ratio(direction, self.length)
    }

    /// Condense a fixed-end reaction vector for the end releases
    fn condense_fer(&self, fer: &Vec12) -> Vec12 {
        apply_fer_releases(fer, &self.k_raw, &self.releases)
    }

    /// Local displacements of the element from a full-size vector
    pub fn local_displacements(&self, u: &Vector) -> Vec12 {
        self.transformation * Vec12::from_fn(|i, _| u[self.dofs[i]])
    }

    /// Local end forces k·T·d + FER, with the geometric term when an axial force is given
    pub fn end_forces(&self, u: &Vector, fer: Option<&Vector>, axial: Option<f64>) -> Vec12 {
        let d = self.local_displacements(u);
        let mut f = self.k_local * d;
        if let Some(p) = axial {
            f += self.local_geometric(p) * d;
        }
        if let Some(fer) = fer {
            f += Vec12::from_column_slice(fer.as_slice());
        }
        f
    }
}

/// Four-node shell kernel in local and global form
#[derive(Debug, Clone)]
pub struct ShellKernel {
    pub name: String,
    pub dofs: [usize; 24],
    pub geometry: ShellGeometry,
    pub transformation: Mat24,
    pub k_local: Mat24,
    pub m_local: Mat24,
    pub e: f64,
    pub nu: f64,
    pub thickness: f64,
    pub rho: f64,
}

impl ShellKernel {
    fn new(resolved: &ResolvedElement, dofs: [usize; 24], geometry: ShellGeometry) -> Self {
        let t = resolved.section.thickness.unwrap_or(0.0);
        let material = &resolved.material;
        Self {
            name: resolved.name.clone(),
            dofs,
            geometry,
            transformation: geometry.transformation(),
            k_local: shell_local_stiffness(&geometry, material.e, material.nu, t),
            m_local: shell_lumped_mass(&geometry, material.rho, t),
            e: material.e,
            nu: material.nu,
            thickness: t,
            rho: material.rho,
        }
    }

    pub fn global_stiffness(&self) -> Mat24 {
        self.transformation.transpose() * self.k_local * self.transformation
    }

    pub fn global_mass(&self) -> Mat24 {
        self.transformation.transpose() * self.m_local * self.transformation
    }

    pub fn local_displacements(&self, u: &Vector) -> Vec24 {
        self.transformation * Vec24::from_fn(|i, _| u[self.dofs[i]])
    }

    pub fn end_forces(&self, u: &Vector, fer: Option<&Vector>) -> Vec24 {
        let mut f = self.k_local * self.local_displacements(u);
        if let Some(fer) = fer {
            f += Vec24::from_column_slice(fer.as_slice());
        }
        f
    }

    /// Centroid stresses and resultants
    pub fn resultants(&self, u: &Vector) -> ShellResultants {
        shell_resultants(&self.geometry, self.e, self.nu, self.thickness, &self.local_displacements(u))
    }
}

/// Element kernels, dispatched by element type
#[derive(Debug, Clone)]
pub enum ElementKernel {
    Frame(FrameKernel),
    Shell(ShellKernel),
}

impl ElementKernel {
    pub fn name(&self) -> &str {
        match self {
            ElementKernel::Frame(k) => &k.name,
            ElementKernel::Shell(k) => &k.name,
        }
    }

    pub fn dofs(&self) -> &[usize] {
        match self {
            ElementKernel::Frame(k) => &k.dofs,
            ElementKernel::Shell(k) => &k.dofs,
        }
    }

    /// Local end forces grouped per element node
    pub fn end_forces(&self, u: &Vector, fer: Option<&Vector>, axial: Option<f64>) -> Vec<[f64; 6]> {
        let values: Vec<f64> = match self {
            ElementKernel::Frame(k) => k.end_forces(u, fer, axial).iter().copied().collect(),
            ElementKernel::Shell(k) => k.end_forces(u, fer).iter().copied().collect(),
        };
        values
            .chunks_exact(6)
            .map(|c| [c[0], c[1], c[2], c[3], c[4], c[5]])
            .collect()
    }
}

/// Load vector of one case or combination
#[derive(Debug, Clone, PartialEq)]
pub struct LoadVector {
    /// Nodal loads plus equivalent element loads over all DOFs
    pub forces: Vector,
    /// Condensed local fixed-end reactions per loaded element
    pub fer: BTreeMap<String, Vector>,
}

impl LoadVector {
    pub fn zeros(size: usize) -> Self {
        Self {
            forces: Vector::zeros(size),
            fer: BTreeMap::new(),
        }
    }

    /// self += factor · other
    pub fn add_scaled(&mut self, other: &LoadVector, factor: f64) {
        self.forces.axpy(factor, &other.forces, 1.0);
        for (name, fer) in &other.fer {
            match self.fer.get_mut(name) {
                Some(existing) => existing.axpy(factor, fer, 1.0),
                None => {
                    self.fer.insert(name.clone(), fer * factor);
                }
            }
        }
    }
}

/// Everything an analysis needs, built once from a validated model
#[derive(Debug, Clone)]
pub struct AssembledModel<'a> {
    validated: &'a ValidatedModel,
    pub dof_map: DofMap,
    pub partition: Partition,
    /// Element kernels in element name order
    pub kernels: Vec<ElementKernel>,
    kernel_index: BTreeMap<String, usize>,
    /// Full stiffness over all DOFs, springs included
    pub stiffness: CsrMatrix<f64>,
    /// Reduced stiffness on the free DOFs
    pub k_ff: CsrMatrix<f64>,
    /// Free-fixed coupling block
    pub k_fr: CsrMatrix<f64>,
    cases: BTreeMap<String, LoadVector>,
}

impl<'a> AssembledModel<'a> {
    pub fn new(validated: &'a ValidatedModel) -> SolverResult<Self> {
        let dof_map = DofMap::new(validated);
        let partition = Partition::new(validated, &dof_map);

        let mut kernels = Vec::with_capacity(validated.elements().len());
        for resolved in validated.elements().values() {
            let kernel = match &resolved.shape {
                ElementShape::Line { length, rotation } => {
                    let dofs = dof_map.element_dofs::<12>(&resolved.element.nodes);
                    ElementKernel::Frame(FrameKernel::new(resolved, dofs, *length, *rotation))
                }
                ElementShape::Shell(geometry) => {
                    let dofs = dof_map.element_dofs::<24>(&resolved.element.nodes);
                    ElementKernel::Shell(ShellKernel::new(resolved, dofs, *geometry))
                }
            };
            kernels.push(kernel);
        }
        let kernel_index = kernels
            .iter()
            .enumerate()
            .map(|(i, k)| (k.name().to_string(), i))
            .collect();

        let mut builder = SparseMatrixBuilder::new(dof_map.size());
        for kernel in &kernels {
            match kernel {
                ElementKernel::Frame(k) => {
                    let kg = k.global_stiffness();
                    debug_assert!(asymmetry(&kg) <= 1e-9 * kg.abs().max().max(1.0), "{} is asymmetric", k.name);
                    builder.add_element_matrix(&k.dofs, &kg);
                }
                ElementKernel::Shell(k) => {
                    let kg = k.global_stiffness();
                    debug_assert!(asymmetry(&kg) <= 1e-9 * kg.abs().max().max(1.0), "{} is asymmetric", k.name);
                    builder.add_element_matrix(&k.dofs, &kg);
                }
            }
        }
        for (&i, &k) in &partition.springs {
            builder.add(i, i, k);
        }
        let stiffness = builder.to_csr();

        let mut assembled = Self {
            validated,
            dof_map,
            partition,
            kernels,
            kernel_index,
            k_ff: CsrMatrix::zeros(0, 0),
            k_fr: CsrMatrix::zeros(0, 0),
            stiffness,
            cases: BTreeMap::new(),
        };
        let (k_ff, k_fr) = assembled.reduce(&assembled.stiffness);
        assembled.k_ff = k_ff;
        assembled.k_fr = k_fr;
        assembled.cases = assembled.build_case_loads()?;

        log::info!(
            "Assembled {} DOFs ({} free) from {} elements, {} stiffness entries",
            assembled.dof_map.size(),
            assembled.partition.num_free(),
            assembled.kernels.len(),
            assembled.stiffness.nnz()
        );

        Ok(assembled)
    }

    pub fn validated(&self) -> &'a ValidatedModel {
        self.validated
    }

    pub fn size(&self) -> usize {
        self.dof_map.size()
    }

    pub fn kernel(&self, name: &str) -> Option<&ElementKernel> {
        self.kernel_index.get(name).map(|&i| &self.kernels[i])
    }

    /// Split a full-size matrix into its free-free and free-fixed blocks
    pub fn reduce(&self, full: &CsrMatrix<f64>) -> (CsrMatrix<f64>, CsrMatrix<f64>) {
        let p = &self.partition;
        let free_map: Vec<Option<usize>> = p
            .status
            .iter()
            .map(|s| match s {
                DofStatus::Free(k) => Some(*k),
                DofStatus::Fixed(_) => None,
            })
            .collect();
        let fixed_map: Vec<Option<usize>> = p
            .status
            .iter()
            .map(|s| match s {
                DofStatus::Fixed(k) => Some(*k),
                DofStatus::Free(_) => None,
            })
            .collect();
        let nf = p.free.len();
        let nr = p.fixed.len();
        (
            extract_submatrix(full, &free_map, &free_map, nf, nf),
            extract_submatrix(full, &free_map, &fixed_map, nf, nr),
        )
    }

    /// Loads of a single load case
    pub fn case_loads(&self, case: &str) -> SolverResult<&LoadVector> {
        self.cases
            .get(case)
            .ok_or_else(|| SolverError::LoadCaseNotFound(case.to_string()))
    }

    /// Loads of a load case or the factored sum of a combination
    pub fn loads_for(&self, name: &str) -> SolverResult<LoadVector> {
        let mut total = LoadVector::zeros(self.size());
        for (case, factor) in self.validated.case_factors(name)? {
            total.add_scaled(self.case_loads(&case)?, factor);
        }
        Ok(total)
    }

    /// Global mass: element masses plus nodal masses of the selected cases
    /// (all cases when `cases` is `None`)
    pub fn mass_matrix(&self, cases: Option<&[String]>) -> CsrMatrix<f64> {
        let mut builder = SparseMatrixBuilder::new(self.size());
        for kernel in &self.kernels {
            match kernel {
                ElementKernel::Frame(k) => builder.add_element_matrix(&k.dofs, &k.global_mass()),
                ElementKernel::Shell(k) => builder.add_element_matrix(&k.dofs, &k.global_mass()),
            }
        }

        for load in &self.validated.model().loads {
            let Load::Mass(mass) = load else { continue };
            if cases.is_some_and(|c| !c.iter().any(|name| name == &mass.case)) {
                continue;
            }
            for (dof, value) in Dof::ALL.into_iter().zip(mass.diagonal()) {
                if let Some(i) = self.dof_map.index(&mass.node, dof) {
                    builder.add(i, i, value);
                }
            }
        }

        builder.to_csr()
    }

    /// Global geometric stiffness for the given frame axial forces (tension
    /// positive, one entry per kernel)
    pub fn geometric_stiffness(&self, axial: &[f64]) -> CsrMatrix<f64> {
        let mut builder = SparseMatrixBuilder::new(self.size());
        for (kernel, &p) in self.kernels.iter().zip(axial) {
            if let ElementKernel::Frame(k) = kernel {
                if p.abs() > 0.0 {
                    builder.add_element_matrix(&k.dofs, &k.global_geometric(p));
                }
            }
        }
        builder.to_csr()
    }

    /// Axial force of every frame kernel (zero for shells) under displacements `u`
    pub fn axial_forces(&self, u: &Vector, loads: &LoadVector) -> Vec<f64> {
        self.kernels
            .iter()
            .map(|kernel| match kernel {
                ElementKernel::Frame(k) => -k.end_forces(u, loads.fer.get(&k.name), None)[0],
                ElementKernel::Shell(_) => 0.0,
            })
            .collect()
    }

    fn build_case_loads(&self) -> SolverResult<BTreeMap<String, LoadVector>> {
        let model = self.validated.model();
        let mut raw_fer: BTreeMap<&str, BTreeMap<String, Vector>> = BTreeMap::new();
        let mut cases: BTreeMap<String, LoadVector> = model
            .load_cases
            .keys()
            .map(|name| (name.clone(), LoadVector::zeros(self.size())))
            .collect();

        let mut add_fer = |case: &'a str, element: &str, fer: Vector| {
            let entry = raw_fer
                .entry(case)
                .or_default()
                .entry(element.to_string())
                .or_insert_with(|| Vector::zeros(fer.len()));
            *entry += fer;
        };

        for load in &self.validated.model().loads {
            match load {
                Load::Nodal(l) => {
                    let case = cases
                        .get_mut(&l.case)
                        .ok_or_else(|| SolverError::LoadCaseNotFound(l.case.clone()))?;
                    for (dof, value) in Dof::ALL.into_iter().zip(l.as_array()) {
                        if let Some(i) = self.dof_map.index(&l.node, dof) {
                            case.forces[i] += value;
                        }
                    }
                }
                Load::Distributed(l) => {
                    let k = self.frame(&l.element)?;
                    let (x1, x2) = l.span(k.length);
                    let (unit, is_local) = l.direction.unit_vector();
                    let mut fer = Vec12::zeros();
                    for (dir, c) in local_components(unit, is_local, &k.rotation).into_iter().enumerate() {
                        if c == 0.0 {
                            continue;
                        }
                        fer += match k.kind {
                            ElementType::Truss => fer_truss_line_load(l.w1 * c, l.w2 * c, x1, x2, k.length, dir),
                            _ => fer_line_load(l.w1 * c, l.w2 * c, x1, x2, k.length, dir, k.shear_ratio(dir)),
                        };
                    }
                    add_fer(&l.case, &l.element, Vector::from_column_slice(fer.as_slice()));
                }
                Load::MemberPoint(l) => {
                    let k = self.frame(&l.element)?;
                    let (unit, is_local) = l.direction.unit_vector();
                    let mut fer = Vec12::zeros();
                    for (dir, c) in local_components(unit, is_local, &k.rotation).into_iter().enumerate() {
                        if c == 0.0 {
                            continue;
                        }
                        fer += match k.kind {
                            ElementType::Truss => fer_truss_point_load(l.magnitude * c, l.position, k.length, dir),
                            _ => fer_point_load(l.magnitude * c, l.position, k.length, dir, k.shear_ratio(dir)),
                        };
                    }
                    add_fer(&l.case, &l.element, Vector::from_column_slice(fer.as_slice()));
                }
                Load::Pressure(l) => {
                    let Some(ElementKernel::Shell(k)) = self.kernel(&l.element) else {
                        return Err(SolverError::ElementNotFound(l.element.clone()));
                    };
                    let fer = shell_pressure_fer(&k.geometry, l.pressure);
                    add_fer(&l.case, &l.element, Vector::from_column_slice(fer.as_slice()));
                }
                Load::Mass(_) => {}
            }
        }

        // Self-weight as a body force on every element
        for (name, case) in &model.load_cases {
            let Some(g) = case.self_weight else { continue };
            for kernel in &self.kernels {
                let fer = match kernel {
                    ElementKernel::Frame(k) => {
                        let w = k.props.rho * k.props.a;
                        let mut fer = Vec12::zeros();
                        for (dir, c) in local_components(g, false, &k.rotation).into_iter().enumerate() {
                            if c == 0.0 {
                                continue;
                            }
                            fer += match k.kind {
                                ElementType::Truss => fer_truss_line_load(w * c, w * c, 0.0, k.length, k.length, dir),
                                _ => fer_line_load(w * c, w * c, 0.0, k.length, k.length, dir, k.shear_ratio(dir)),
                            };
                        }
                        Vector::from_column_slice(fer.as_slice())
                    }
                    ElementKernel::Shell(k) => {
                        let fer = shell_body_force_fer(&k.geometry, k.rho, k.thickness, g);
                        Vector::from_column_slice(fer.as_slice())
                    }
                };
                add_fer(name, kernel.name(), fer);
            }
        }

        // Condense for releases and apply the equivalent nodal loads
        for (case_name, elements) in raw_fer {
            let case = cases
                .get_mut(case_name)
                .ok_or_else(|| SolverError::LoadCaseNotFound(case_name.to_string()))?;
            for (element, fer) in elements {
                let Some(kernel) = self.kernel(&element) else { continue };
                let (condensed, equivalent): (Vector, Vector) = match kernel {
                    ElementKernel::Frame(k) => {
                        let fer = k.condense_fer(&Vec12::from_column_slice(fer.as_slice()));
                        let eq = -(k.transformation.transpose() * fer);
                        (
                            Vector::from_column_slice(fer.as_slice()),
                            Vector::from_column_slice(eq.as_slice()),
                        )
                    }
                    ElementKernel::Shell(k) => {
                        let fer = Vec24::from_column_slice(fer.as_slice());
                        let eq = -(k.transformation.transpose() * fer);
                        (
                            Vector::from_column_slice(fer.as_slice()),
                            Vector::from_column_slice(eq.as_slice()),
                        )
                    }
                };
                for (&dof, value) in kernel.dofs().iter().zip(equivalent.iter()) {
                    case.forces[dof] += value;
                }
                case.fer.insert(element, condensed);
            }
        }

        Ok(cases)
    }

    fn frame(&self, element: &str) -> SolverResult<&FrameKernel> {
        match self.kernel(element) {
            Some(ElementKernel::Frame(k)) => Ok(k),
            _ => Err(SolverError::ElementNotFound(element.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Element, ElementReleases, Material, Node, Section, Support};
    use crate::loads::{DistributedLoad, LoadCase, LoadDirection, NodeLoad};
    use crate::math::sparse_matvec;
    use crate::model::StructuralModel;
    use crate::validation::validate;
    use approx::assert_relative_eq;

    fn beam_model() -> StructuralModel {
        let mut model = StructuralModel::new();
        model.add_material("Steel", Material::steel()).unwrap();
        model.add_section("S", Section::rectangular(0.2, 0.4)).unwrap();
        for (name, x) in [("C", 0.0), ("A", 3.0), ("B", 6.0)] {
            model.add_node(name, Node::new(x, 0.0, 0.0)).unwrap();
        }
        model.add_element("M1", Element::beam("C", "A", "Steel", "S")).unwrap();
        model.add_element("M2", Element::beam("A", "B", "Steel", "S")).unwrap();
        model.add_support("C", Support::fixed()).unwrap();
        model.add_support("B", Support::new().with_spring(Dof::DY, 5e5)).unwrap();
        model
    }

    #[test]
    fn test_dof_map_is_deterministic() {
        let validated = validate(&beam_model()).unwrap();
        let a = DofMap::new(&validated);
        let b = DofMap::new(&validated);
        assert_eq!(a, b);
        assert_eq!(a.size(), 18);
        let i = a.index("A", Dof::RZ).unwrap();
        assert_eq!(a.label(i), DofLabel::new("A", Dof::RZ));
    }

    #[test]
    fn test_partition_and_springs() {
        let validated = validate(&beam_model()).unwrap();
        let assembled = AssembledModel::new(&validated).unwrap();
        assert_eq!(assembled.partition.num_free(), 12);
        assert_eq!(assembled.k_ff.nrows(), 12);
        assert_eq!(assembled.k_fr.ncols(), 6);

        let i = assembled.dof_map.index("B", Dof::DY).unwrap();
        assert_eq!(assembled.partition.spring(i), Some(5e5));
    }

    #[test]
    fn test_global_stiffness_is_symmetric() {
        let validated = validate(&beam_model()).unwrap();
        let assembled = AssembledModel::new(&validated).unwrap();
        let dense = nalgebra::DMatrix::from(&assembled.stiffness);
        assert_relative_eq!(dense.clone(), dense.transpose(), epsilon = 1e-3);
    }

    #[test]
    fn test_uniform_load_equivalent_nodal_forces() {
        let mut model = beam_model();
        model
            .add_load(DistributedLoad::uniform("M2", -10.0, LoadDirection::FY, "Live"))
            .unwrap();
        let validated = validate(&model).unwrap();
        let assembled = AssembledModel::new(&validated).unwrap();
        let loads = assembled.case_loads("Live").unwrap();
        let total: f64 = ["A", "B"]
            .iter()
            .map(|n| loads.forces[assembled.dof_map.index(n, Dof::DY).unwrap()])
            .sum();
        assert_relative_eq!(total, -30.0, epsilon = 1e-9);
        assert!(loads.fer.contains_key("M2"));
    }

    #[test]
    fn test_self_weight_matches_member_weight() {
        let mut model = beam_model();
        model.add_load_case(LoadCase::dead()).unwrap();
        let validated = validate(&model).unwrap();
        let assembled = AssembledModel::new(&validated).unwrap();
        let loads = assembled.case_loads("Dead").unwrap();
        let fy: f64 = (0..assembled.size()).step_by(6).map(|i| loads.forces[i + 1]).sum();
        let section = Section::rectangular(0.2, 0.4);
        assert_relative_eq!(fy, -9.81 * 7850.0 * section.a * 6.0, max_relative = 1e-9);
    }

    #[test]
    fn test_released_dof_gets_no_equivalent_moment() {
        let mut model = beam_model();
        let released = Element::beam("A", "B", "Steel", "S").with_releases(ElementReleases::pin_j());
        model.elements.insert("M2".to_string(), released);
        model
            .add_load(DistributedLoad::uniform("M2", -10.0, LoadDirection::Fy, "Live"))
            .unwrap();
        let validated = validate(&model).unwrap();
        let assembled = AssembledModel::new(&validated).unwrap();
        let loads = assembled.case_loads("Live").unwrap();
        let fer = &loads.fer["M2"];
        assert_eq!(fer[11], 0.0);
        // Propped cantilever with shear flexibility: wL(5 + φ)/(8 + 2φ) at the fixed end
        let phi = assembled.frame("M2").unwrap().shear_ratio(1);
        assert!(phi > 0.0);
        let wl = 10.0 * 3.0;
        assert_relative_eq!(fer[1], wl * (5.0 + phi) / (8.0 + 2.0 * phi), max_relative = 1e-9);
        assert_relative_eq!(fer[7], wl * (3.0 + phi) / (8.0 + 2.0 * phi), max_relative = 1e-9);
    }

    #[test]
    fn test_released_dof_without_shear_area_is_euler_bernoulli() {
        let mut model = beam_model();
        model.sections.insert("S".to_string(), Section::new(0.08, 2.7e-4, 1.07e-3, 7.3e-4));
        let released = Element::beam("A", "B", "Steel", "S").with_releases(ElementReleases::pin_j());
        model.elements.insert("M2".to_string(), released);
        model
            .add_load(DistributedLoad::uniform("M2", -10.0, LoadDirection::Fy, "Live"))
            .unwrap();
        let validated = validate(&model).unwrap();
        let assembled = AssembledModel::new(&validated).unwrap();
        let fer = &assembled.case_loads("Live").unwrap().fer["M2"];
        // Propped cantilever: 5/8 wL at the fixed end, 3/8 at the pin
        assert_relative_eq!(fer[1], 10.0 * 3.0 * 5.0 / 8.0, max_relative = 1e-9);
        assert_relative_eq!(fer[7], 10.0 * 3.0 * 3.0 / 8.0, max_relative = 1e-9);
    }

    #[test]
    fn test_truss_rotations_are_inactive() {
        let mut model = StructuralModel::new();
        model.add_material("Steel", Material::steel()).unwrap();
        model.add_section("Bar", Section::axial(1e-3)).unwrap();
        model.add_node("A", Node::new(0.0, 0.0, 0.0)).unwrap();
        model.add_node("B", Node::new(5.0, 0.0, 0.0)).unwrap();
        model.add_element("T1", Element::truss("A", "B", "Steel", "Bar")).unwrap();
        model.add_support("A", Support::pinned()).unwrap();
        model.add_load(NodeLoad::force("B", 1e4, 0.0, 0.0, "Pull")).unwrap();
        let validated = validate(&model).unwrap();
        let assembled = AssembledModel::new(&validated).unwrap();
        let rx = assembled.dof_map.index("B", Dof::RX).unwrap();
        assert!(assembled.partition.is_inactive(rx));
        assert_eq!(assembled.partition.num_free(), 3);

        // Axial force recovered from a unit elongation
        let mut u = Vector::zeros(assembled.size());
        u[assembled.dof_map.index("B", Dof::DX).unwrap()] = 1e-3;
        let loads = assembled.case_loads("Pull").unwrap();
        let axial = assembled.axial_forces(&u, loads);
        assert_relative_eq!(axial[0], 200e9 * 1e-3 * 1e-3 / 5.0, max_relative = 1e-12);
        let f = sparse_matvec(&assembled.stiffness, &u);
        assert_relative_eq!(f[assembled.dof_map.index("B", Dof::DX).unwrap()], axial[0], max_relative = 1e-12);
    }
}
