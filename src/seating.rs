use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeatingError {
    #[error("hall must have at least one row and one column (got {rows}x{cols})")]
    InvalidHall { rows: usize, cols: usize },
    #[error("{students} students do not fit in {seats} open seats")]
    CapacityExceeded { students: usize, seats: usize },
    #[error("student {0} appears more than once in the roster")]
    DuplicateStudent(String),
    #[error("seat {0} not found in plan")]
    SeatNotFound(String),
    #[error("seat {0} is blocked and cannot be swapped")]
    SeatBlocked(String),
}

impl SeatingError {
    /// Stable error code reported over IPC.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidHall { .. } => "invalid_hall",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::DuplicateStudent(_) => "duplicate_student",
            Self::SeatNotFound(_) => "not_found",
            Self::SeatBlocked(_) => "seat_blocked",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HallGeometry {
    rows: usize,
    cols: usize,
}

impl HallGeometry {
    pub fn new(rows: usize, cols: usize) -> Result<Self, SeatingError> {
        if rows == 0 || cols == 0 {
            return Err(SeatingError::InvalidHall { rows, cols });
        }
        Ok(Self { rows, cols })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn capacity(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_corner(&self, row: usize, col: usize) -> bool {
        (row == 0 || row == self.rows - 1) && (col == 0 || col == self.cols - 1)
    }
}

/// One student as the assigner sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub id: String,
    pub name: String,
    pub roll_no: String,
    pub special_requirement: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArrangementMode {
    Random,
    Alphabetical,
    RollNumber,
    MixedPrograms,
}

impl ArrangementMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "random" => Some(Self::Random),
            "alphabetical" => Some(Self::Alphabetical),
            "rollNumber" => Some(Self::RollNumber),
            "mixedPrograms" => Some(Self::MixedPrograms),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Alphabetical => "alphabetical",
            Self::RollNumber => "rollNumber",
            Self::MixedPrograms => "mixedPrograms",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssignOptions {
    pub gap_between_students: u32,
    pub block_corner_seats: bool,
    pub block_front_row: bool,
    /// Leave excess students unseated instead of failing.
    pub allow_overflow: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatStatus {
    Available,
    Occupied,
    Blocked,
    Reserved,
}

impl SeatStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "available" => Some(Self::Available),
            "occupied" => Some(Self::Occupied),
            "blocked" => Some(Self::Blocked),
            "reserved" => Some(Self::Reserved),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Occupied => "occupied",
            Self::Blocked => "blocked",
            Self::Reserved => "reserved",
        }
    }
}

/// Student binding carried by an occupied seat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occupant {
    pub student_id: String,
    pub name: String,
    pub roll_no: String,
    pub special_requirement: Option<String>,
}

impl From<&RosterEntry> for Occupant {
    fn from(s: &RosterEntry) -> Self {
        Self {
            student_id: s.id.clone(),
            name: s.name.clone(),
            roll_no: s.roll_no.clone(),
            special_requirement: s.special_requirement.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeatState {
    Available,
    Occupied(Occupant),
    Blocked,
    Reserved,
}

impl SeatState {
    pub fn status(&self) -> SeatStatus {
        match self {
            Self::Available => SeatStatus::Available,
            Self::Occupied(_) => SeatStatus::Occupied,
            Self::Blocked => SeatStatus::Blocked,
            Self::Reserved => SeatStatus::Reserved,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    pub label: String,
    pub row: usize,
    pub col: usize,
    pub state: SeatState,
}

impl Seat {
    pub fn status(&self) -> SeatStatus {
        self.state.status()
    }

    pub fn occupant(&self) -> Option<&Occupant> {
        match &self.state {
            SeatState::Occupied(o) => Some(o),
            _ => None,
        }
    }
}

/// Row letters run A..Z, then AA, AB, ... like spreadsheet columns.
pub fn row_letters(row: usize) -> String {
    let mut n = row + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

pub fn seat_label(row: usize, col: usize) -> String {
    format!("{}{}", row_letters(row), col + 1)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeatCounts {
    pub total: usize,
    pub occupied: usize,
    pub available: usize,
    pub blocked: usize,
    pub reserved: usize,
}

impl SeatCounts {
    pub fn tally(seats: &[Seat]) -> Self {
        let mut counts = Self {
            total: seats.len(),
            ..Self::default()
        };
        for seat in seats {
            match seat.status() {
                SeatStatus::Occupied => counts.occupied += 1,
                SeatStatus::Available => counts.available += 1,
                SeatStatus::Blocked => counts.blocked += 1,
                SeatStatus::Reserved => counts.reserved += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub seats: Vec<Seat>,
    /// Students left without a seat (only when overflow is allowed).
    pub unseated: Vec<String>,
}

fn blocked_by_rules(hall: HallGeometry, options: &AssignOptions, row: usize, col: usize) -> bool {
    if options.block_corner_seats && hall.is_corner(row, col) {
        return true;
    }
    if options.block_front_row && row == 0 {
        return true;
    }
    let gap = options.gap_between_students as usize;
    gap > 0 && (row + col) % (gap + 1) != 0
}

/// Number of cells the blocking rules leave open for students.
pub fn open_seat_count(hall: HallGeometry, options: &AssignOptions) -> usize {
    let mut n = 0;
    for row in 0..hall.rows {
        for col in 0..hall.cols {
            if !blocked_by_rules(hall, options, row, col) {
                n += 1;
            }
        }
    }
    n
}

/// Orders the roster for seating. Sorts are stable.
pub fn order_roster<'a, R: Rng + ?Sized>(
    students: &'a [RosterEntry],
    mode: ArrangementMode,
    rng: &mut R,
) -> Vec<&'a RosterEntry> {
    let mut ordered: Vec<&RosterEntry> = students.iter().collect();
    match mode {
        ArrangementMode::Alphabetical => ordered.sort_by(|a, b| a.name.cmp(&b.name)),
        ArrangementMode::RollNumber => ordered.sort_by(|a, b| a.roll_no.cmp(&b.roll_no)),
        ArrangementMode::Random => ordered.shuffle(rng),
        ArrangementMode::MixedPrograms => {}
    }
    ordered
}

/// Walks the hall in row-major order and binds students to open seats.
pub fn assign<R: Rng + ?Sized>(
    hall: HallGeometry,
    students: &[RosterEntry],
    mode: ArrangementMode,
    options: &AssignOptions,
    rng: &mut R,
) -> Result<Assignment, SeatingError> {
    let mut seen = HashSet::with_capacity(students.len());
    for s in students {
        if !seen.insert(s.id.as_str()) {
            return Err(SeatingError::DuplicateStudent(s.id.clone()));
        }
    }

    let open = open_seat_count(hall, options);
    if students.len() > open && !options.allow_overflow {
        return Err(SeatingError::CapacityExceeded {
            students: students.len(),
            seats: open,
        });
    }

    let ordered = order_roster(students, mode, rng);
    let mut cursor = ordered.iter();
    let mut seats = Vec::with_capacity(hall.capacity());
    for row in 0..hall.rows {
        for col in 0..hall.cols {
            let state = if blocked_by_rules(hall, options, row, col) {
                SeatState::Blocked
            } else if let Some(student) = cursor.next() {
                SeatState::Occupied(Occupant::from(*student))
            } else {
                SeatState::Available
            };
            seats.push(Seat {
                label: seat_label(row, col),
                row,
                col,
                state,
            });
        }
    }

    let unseated = cursor.map(|s| s.id.clone()).collect();
    Ok(Assignment { seats, unseated })
}

/// Exchanges the occupancy of two seats identified by label.
pub fn swap_seats(seats: &mut [Seat], a: &str, b: &str) -> Result<(), SeatingError> {
    let ia = seats
        .iter()
        .position(|s| s.label == a)
        .ok_or_else(|| SeatingError::SeatNotFound(a.to_string()))?;
    let ib = seats
        .iter()
        .position(|s| s.label == b)
        .ok_or_else(|| SeatingError::SeatNotFound(b.to_string()))?;
    for i in [ia, ib] {
        if seats[i].status() == SeatStatus::Blocked {
            return Err(SeatingError::SeatBlocked(seats[i].label.clone()));
        }
    }
    if ia == ib {
        return Ok(());
    }

    let a_state = std::mem::replace(&mut seats[ia].state, SeatState::Available);
    let b_state = std::mem::replace(&mut seats[ib].state, a_state);
    seats[ia].state = b_state;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    fn student(id: &str, name: &str, roll: &str) -> RosterEntry {
        RosterEntry {
            id: id.to_string(),
            name: name.to_string(),
            roll_no: roll.to_string(),
            special_requirement: None,
        }
    }

    fn rng() -> ChaCha12Rng {
        ChaCha12Rng::seed_from_u64(7)
    }

    fn occupant_names(seats: &[Seat]) -> Vec<String> {
        seats
            .iter()
            .filter_map(|s| s.occupant().map(|o| o.name.clone()))
            .collect()
    }

    #[test]
    fn alphabetical_two_by_two_example() {
        let hall = HallGeometry::new(2, 2).expect("hall");
        let roster = vec![
            student("1", "Bob", "R2"),
            student("2", "Alice", "R1"),
            student("3", "Carol", "R3"),
        ];
        let out = assign(
            hall,
            &roster,
            ArrangementMode::Alphabetical,
            &AssignOptions::default(),
            &mut rng(),
        )
        .expect("assign");

        let labels: Vec<&str> = out.seats.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["A1", "A2", "B1", "B2"]);
        assert_eq!(out.seats[0].occupant().map(|o| o.name.as_str()), Some("Alice"));
        assert_eq!(out.seats[1].occupant().map(|o| o.name.as_str()), Some("Bob"));
        assert_eq!(out.seats[2].occupant().map(|o| o.name.as_str()), Some("Carol"));
        assert_eq!(out.seats[3].status(), SeatStatus::Available);
        assert!(out.unseated.is_empty());
    }

    #[test]
    fn roll_number_mode_sorts_by_code() {
        let hall = HallGeometry::new(1, 3).expect("hall");
        let roster = vec![
            student("1", "Zed", "B-02"),
            student("2", "Amy", "C-01"),
            student("3", "Max", "A-10"),
        ];
        let out = assign(
            hall,
            &roster,
            ArrangementMode::RollNumber,
            &AssignOptions::default(),
            &mut rng(),
        )
        .expect("assign");
        assert_eq!(occupant_names(&out.seats), vec!["Max", "Zed", "Amy"]);
    }

    #[test]
    fn mixed_programs_keeps_insertion_order() {
        let hall = HallGeometry::new(2, 2).expect("hall");
        let roster = vec![
            student("1", "Carol", "3"),
            student("2", "Alice", "1"),
            student("3", "Bob", "2"),
        ];
        let out = assign(
            hall,
            &roster,
            ArrangementMode::MixedPrograms,
            &AssignOptions::default(),
            &mut rng(),
        )
        .expect("assign");
        assert_eq!(occupant_names(&out.seats), vec!["Carol", "Alice", "Bob"]);
    }

    #[test]
    fn random_mode_seats_every_student_once() {
        let hall = HallGeometry::new(3, 4).expect("hall");
        let roster: Vec<RosterEntry> = (0..10)
            .map(|i| student(&i.to_string(), &format!("S{i}"), &format!("{i:03}")))
            .collect();
        let out = assign(
            hall,
            &roster,
            ArrangementMode::Random,
            &AssignOptions::default(),
            &mut rng(),
        )
        .expect("assign");
        let mut ids: Vec<String> = out
            .seats
            .iter()
            .filter_map(|s| s.occupant().map(|o| o.student_id.clone()))
            .collect();
        ids.sort_by_key(|id| id.parse::<usize>().unwrap_or(0));
        let expected: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn random_mode_is_reproducible_with_same_seed() {
        let hall = HallGeometry::new(4, 4).expect("hall");
        let roster: Vec<RosterEntry> = (0..12)
            .map(|i| student(&i.to_string(), &format!("S{i}"), &format!("{i}")))
            .collect();
        let opts = AssignOptions::default();
        let a = assign(hall, &roster, ArrangementMode::Random, &opts, &mut rng()).expect("a");
        let b = assign(hall, &roster, ArrangementMode::Random, &opts, &mut rng()).expect("b");
        assert_eq!(a, b);
    }

    #[test]
    fn corner_blocking_takes_precedence() {
        let hall = HallGeometry::new(3, 4).expect("hall");
        let opts = AssignOptions {
            block_corner_seats: true,
            ..AssignOptions::default()
        };
        let out =
            assign(hall, &[], ArrangementMode::Alphabetical, &opts, &mut rng()).expect("assign");
        let blocked: Vec<&str> = out
            .seats
            .iter()
            .filter(|s| s.status() == SeatStatus::Blocked)
            .map(|s| s.label.as_str())
            .collect();
        assert_eq!(blocked, vec!["A1", "A4", "C1", "C4"]);
    }

    #[test]
    fn front_row_and_gap_rules_block_cells() {
        let hall = HallGeometry::new(3, 3).expect("hall");
        let opts = AssignOptions {
            block_front_row: true,
            gap_between_students: 1,
            ..AssignOptions::default()
        };
        let roster = vec![student("1", "Ann", "1"), student("2", "Ben", "2")];
        let out = assign(hall, &roster, ArrangementMode::Alphabetical, &opts, &mut rng())
            .expect("assign");
        let statuses: Vec<&str> = out.seats.iter().map(|s| s.status().as_str()).collect();
        assert_eq!(
            statuses,
            vec![
                "blocked",
                "blocked",
                "blocked",
                "blocked",
                "occupied",
                "blocked",
                "occupied",
                "blocked",
                "available",
            ]
        );
        assert_eq!(out.seats[4].label, "B2");
        assert_eq!(out.seats[6].label, "C1");
    }

    #[test]
    fn single_row_hall_with_corners_and_front_row() {
        let hall = HallGeometry::new(1, 5).expect("hall");
        let opts = AssignOptions {
            block_corner_seats: true,
            block_front_row: true,
            ..AssignOptions::default()
        };
        let counts = SeatCounts::tally(
            &assign(hall, &[], ArrangementMode::Random, &opts, &mut rng())
                .expect("assign")
                .seats,
        );
        assert_eq!(counts.blocked, 5);
        assert_eq!(counts.total, 5);
    }

    #[test]
    fn capacity_exceeded_is_reported() {
        let hall = HallGeometry::new(1, 2).expect("hall");
        let roster = vec![
            student("1", "A", "1"),
            student("2", "B", "2"),
            student("3", "C", "3"),
        ];
        let err = assign(
            hall,
            &roster,
            ArrangementMode::Alphabetical,
            &AssignOptions::default(),
            &mut rng(),
        )
        .expect_err("should not fit");
        assert_eq!(
            err,
            SeatingError::CapacityExceeded {
                students: 3,
                seats: 2
            }
        );
        assert_eq!(err.code(), "capacity_exceeded");
    }

    #[test]
    fn overflow_leaves_tail_unseated() {
        let hall = HallGeometry::new(1, 2).expect("hall");
        let roster = vec![
            student("c", "Cara", "3"),
            student("a", "Abe", "1"),
            student("b", "Bea", "2"),
        ];
        let opts = AssignOptions {
            allow_overflow: true,
            ..AssignOptions::default()
        };
        let out = assign(hall, &roster, ArrangementMode::Alphabetical, &opts, &mut rng())
            .expect("assign");
        assert_eq!(occupant_names(&out.seats), vec!["Abe", "Bea"]);
        assert_eq!(out.unseated, vec!["c".to_string()]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let hall = HallGeometry::new(2, 2).expect("hall");
        let roster = vec![student("1", "A", "1"), student("1", "B", "2")];
        let err = assign(
            hall,
            &roster,
            ArrangementMode::MixedPrograms,
            &AssignOptions::default(),
            &mut rng(),
        )
        .expect_err("duplicate");
        assert_eq!(err, SeatingError::DuplicateStudent("1".into()));
    }

    #[test]
    fn zero_dimensions_are_invalid() {
        assert_eq!(
            HallGeometry::new(0, 3),
            Err(SeatingError::InvalidHall { rows: 0, cols: 3 })
        );
        assert!(HallGeometry::new(4, 0).is_err());
    }

    #[test]
    fn special_requirement_travels_with_student() {
        let hall = HallGeometry::new(1, 1).expect("hall");
        let mut s = student("1", "Ana", "1");
        s.special_requirement = Some("wheelchair access".into());
        let out = assign(
            hall,
            &[s],
            ArrangementMode::Alphabetical,
            &AssignOptions::default(),
            &mut rng(),
        )
        .expect("assign");
        assert_eq!(
            out.seats[0]
                .occupant()
                .and_then(|o| o.special_requirement.as_deref()),
            Some("wheelchair access")
        );
    }

    #[test]
    fn labels_roll_over_past_z() {
        assert_eq!(seat_label(0, 0), "A1");
        assert_eq!(seat_label(25, 9), "Z10");
        assert_eq!(seat_label(26, 0), "AA1");
        assert_eq!(seat_label(27, 2), "AB3");
        assert_eq!(row_letters(51), "AZ");
        assert_eq!(row_letters(52), "BA");
    }

    #[test]
    fn swap_moves_student_to_available_seat() {
        let hall = HallGeometry::new(1, 3).expect("hall");
        let roster = vec![student("1", "Ana", "1")];
        let mut seats = assign(
            hall,
            &roster,
            ArrangementMode::Alphabetical,
            &AssignOptions::default(),
            &mut rng(),
        )
        .expect("assign")
        .seats;
        swap_seats(&mut seats, "A1", "A3").expect("swap");
        assert_eq!(seats[0].status(), SeatStatus::Available);
        assert_eq!(seats[2].occupant().map(|o| o.name.as_str()), Some("Ana"));
        assert_eq!(seats[2].label, "A3");
    }

    #[test]
    fn swap_rejects_blocked_and_unknown_seats() {
        let hall = HallGeometry::new(2, 2).expect("hall");
        let opts = AssignOptions {
            block_front_row: true,
            ..AssignOptions::default()
        };
        let mut seats = assign(hall, &[], ArrangementMode::Alphabetical, &opts, &mut rng())
            .expect("assign")
            .seats;
        let before = seats.clone();
        assert_eq!(
            swap_seats(&mut seats, "A1", "B1"),
            Err(SeatingError::SeatBlocked("A1".into()))
        );
        assert_eq!(
            swap_seats(&mut seats, "B1", "Z9"),
            Err(SeatingError::SeatNotFound("Z9".into()))
        );
        assert_eq!(seats, before);
        swap_seats(&mut seats, "B2", "B2").expect("self swap");
        assert_eq!(seats, before);
    }

    fn arb_roster(max: usize) -> impl Strategy<Value = Vec<RosterEntry>> {
        prop::collection::vec(("[a-e]{1,3}", "[0-9]{1,2}", any::<bool>()), 0..max).prop_map(
            |rows| {
                rows.into_iter()
                    .enumerate()
                    .map(|(i, (name, roll, special))| RosterEntry {
                        id: format!("s{i}"),
                        name,
                        roll_no: roll,
                        special_requirement: special.then(|| "extra time".to_string()),
                    })
                    .collect()
            },
        )
    }

    fn arb_options() -> impl Strategy<Value = AssignOptions> {
        (0u32..4, any::<bool>(), any::<bool>()).prop_map(|(gap, corners, front)| AssignOptions {
            gap_between_students: gap,
            block_corner_seats: corners,
            block_front_row: front,
            allow_overflow: true,
        })
    }

    fn arb_mode() -> impl Strategy<Value = ArrangementMode> {
        prop_oneof![
            Just(ArrangementMode::Random),
            Just(ArrangementMode::Alphabetical),
            Just(ArrangementMode::RollNumber),
            Just(ArrangementMode::MixedPrograms),
        ]
    }

    proptest! {
        #[test]
        fn grid_is_fully_covered(rows in 1usize..9, cols in 1usize..9, roster in arb_roster(40),
                                 mode in arb_mode(), opts in arb_options(), seed in any::<u64>()) {
            let hall = HallGeometry::new(rows, cols).expect("hall");
            let mut r = ChaCha12Rng::seed_from_u64(seed);
            let out = assign(hall, &roster, mode, &opts, &mut r).expect("assign");
            prop_assert_eq!(out.seats.len(), rows * cols);
            let positions: HashSet<(usize, usize)> =
                out.seats.iter().map(|s| (s.row, s.col)).collect();
            prop_assert_eq!(positions.len(), rows * cols);
            for (i, seat) in out.seats.iter().enumerate() {
                prop_assert_eq!((seat.row, seat.col), (i / cols, i % cols));
            }
        }

        #[test]
        fn occupied_is_min_of_open_seats_and_students(rows in 1usize..9, cols in 1usize..9,
                                                     roster in arb_roster(40), mode in arb_mode(),
                                                     opts in arb_options()) {
            let hall = HallGeometry::new(rows, cols).expect("hall");
            let out = assign(hall, &roster, mode, &opts, &mut rng()).expect("assign");
            let counts = SeatCounts::tally(&out.seats);
            let open = counts.total - counts.blocked;
            prop_assert_eq!(counts.occupied, open.min(roster.len()));
            prop_assert_eq!(counts.occupied + out.unseated.len(), roster.len());
            let ids: HashSet<&str> = out.seats.iter()
                .filter_map(|s| s.occupant().map(|o| o.student_id.as_str()))
                .collect();
            prop_assert_eq!(ids.len(), counts.occupied);
        }

        #[test]
        fn alphabetical_is_stable_and_sorted(rows in 1usize..7, cols in 1usize..7,
                                             roster in arb_roster(30), opts in arb_options()) {
            let hall = HallGeometry::new(rows, cols).expect("hall");
            let out = assign(hall, &roster, ArrangementMode::Alphabetical, &opts, &mut rng())
                .expect("assign");
            let seated: Vec<&Occupant> = out.seats.iter().filter_map(|s| s.occupant()).collect();
            let index_of = |id: &str| roster.iter().position(|s| s.id == id).unwrap_or(usize::MAX);
            for pair in seated.windows(2) {
                prop_assert!(pair[0].name <= pair[1].name);
                if pair[0].name == pair[1].name {
                    prop_assert!(index_of(&pair[0].student_id) < index_of(&pair[1].student_id));
                }
            }
        }

        #[test]
        fn roll_number_is_stable_and_sorted(rows in 1usize..7, cols in 1usize..7,
                                            roster in arb_roster(30), opts in arb_options()) {
            let hall = HallGeometry::new(rows, cols).expect("hall");
            let out = assign(hall, &roster, ArrangementMode::RollNumber, &opts, &mut rng())
                .expect("assign");
            let seated: Vec<&Occupant> = out.seats.iter().filter_map(|s| s.occupant()).collect();
            let index_of = |id: &str| roster.iter().position(|s| s.id == id).unwrap_or(usize::MAX);
            for pair in seated.windows(2) {
                prop_assert!(pair[0].roll_no <= pair[1].roll_no);
                if pair[0].roll_no == pair[1].roll_no {
                    prop_assert!(index_of(&pair[0].student_id) < index_of(&pair[1].student_id));
                }
            }
        }

        #[test]
        fn corner_blocking_blocks_exactly_four(rows in 2usize..10, cols in 2usize..10,
                                               roster in arb_roster(20)) {
            let hall = HallGeometry::new(rows, cols).expect("hall");
            let opts = AssignOptions {
                block_corner_seats: true,
                allow_overflow: true,
                ..AssignOptions::default()
            };
            let out = assign(hall, &roster, ArrangementMode::MixedPrograms, &opts, &mut rng())
                .expect("assign");
            let blocked: Vec<(usize, usize)> = out.seats.iter()
                .filter(|s| s.status() == SeatStatus::Blocked)
                .map(|s| (s.row, s.col))
                .collect();
            prop_assert_eq!(
                blocked,
                vec![(0, 0), (0, cols - 1), (rows - 1, 0), (rows - 1, cols - 1)]
            );
        }

        #[test]
        fn swap_only_touches_the_two_seats(rows in 1usize..6, cols in 2usize..6,
                                           roster in arb_roster(30),
                                           a in any::<prop::sample::Index>(),
                                           b in any::<prop::sample::Index>()) {
            let hall = HallGeometry::new(rows, cols).expect("hall");
            let opts = AssignOptions {
                allow_overflow: true,
                ..AssignOptions::default()
            };
            let before = assign(hall, &roster, ArrangementMode::Alphabetical, &opts, &mut rng())
                .expect("assign").seats;
            let ia = a.index(before.len());
            let ib = b.index(before.len());
            let mut after = before.clone();
            swap_seats(&mut after, &before[ia].label, &before[ib].label).expect("swap");
            prop_assert_eq!(&after[ia].state, &before[ib].state);
            prop_assert_eq!(&after[ib].state, &before[ia].state);
            for i in 0..before.len() {
                if i != ia && i != ib {
                    prop_assert_eq!(&after[i], &before[i]);
                }
                prop_assert_eq!(&after[i].label, &before[i].label);
            }
        }
    }
}
