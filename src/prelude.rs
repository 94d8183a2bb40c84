pub use anyhow::{anyhow, bail, Context, Result};

pub use glam::{Vec2, Vec3};

pub use itertools::Itertools;
pub use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

pub use crate::error::MeshError;
pub use crate::mesh::halfedge;
pub use crate::mesh::halfedge::*;

pub use halfedge_commons::math::*;
pub use halfedge_commons::utils::*;

pub mod nom_prelude {
    pub use nom::{
        branch::alt,
        bytes::complete::{tag, take_while1},
        character::complete::{char, digit1, multispace0},
        combinator::{all_consuming, map, map_res},
        multi::separated_list1,
        sequence::{delimited, preceded, separated_pair},
        IResult, Parser,
    };
}
