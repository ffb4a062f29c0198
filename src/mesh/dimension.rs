/// Topological dimension of a mesh entity class: vertex, edge, triangle, or
/// tetrahedron. Mirrors the four entity classes spec.md §3 enumerates for a
/// mesh of dimension 2 or 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dimension {
    Vert,
    Edge,
    Tri,
    Tet,
}

impl Dimension {
    pub const VERT: Dimension = Dimension::Vert;
    pub const EDGE: Dimension = Dimension::Edge;
    pub const TRI: Dimension = Dimension::Tri;
    pub const TET: Dimension = Dimension::Tet;

    /// Number of vertices of a simplex of this dimension (1, 2, 3, 4).
    pub fn nverts(self) -> usize {
        u8::from(self) as usize + 1
    }
}

impl From<Dimension> for u8 {
    fn from(dim: Dimension) -> u8 {
        match dim {
            Dimension::Vert => 0,
            Dimension::Edge => 1,
            Dimension::Tri => 2,
            Dimension::Tet => 3,
        }
    }
}

impl TryFrom<u8> for Dimension {
    type Error = String;
    fn try_from(i: u8) -> Result<Dimension, String> {
        match i {
            0 => Ok(Dimension::Vert),
            1 => Ok(Dimension::Edge),
            2 => Ok(Dimension::Tri),
            3 => Ok(Dimension::Tet),
            _ => Err(format!("{i} is not a valid entity dimension (0..=3)")),
        }
    }
}

impl TryFrom<usize> for Dimension {
    type Error = String;
    fn try_from(i: usize) -> Result<Dimension, String> {
        u8::try_from(i)
            .map_err(|_| format!("{i} is not a valid entity dimension (0..=3)"))
            .and_then(Dimension::try_from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nverts_matches_simplex_template() {
        assert_eq!(Dimension::Vert.nverts(), 1);
        assert_eq!(Dimension::Edge.nverts(), 2);
        assert_eq!(Dimension::Tri.nverts(), 3);
        assert_eq!(Dimension::Tet.nverts(), 4);
    }

    #[test]
    fn round_trips_through_u8() {
        for d in [Dimension::Vert, Dimension::Edge, Dimension::Tri, Dimension::Tet] {
            let i: u8 = d.into();
            assert_eq!(Dimension::try_from(i).unwrap(), d);
        }
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(Dimension::try_from(4u8).is_err());
    }
}
