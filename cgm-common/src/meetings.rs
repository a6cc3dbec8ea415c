//! Meeting assignment rules
//!
//! Which meeting each assignment type belongs to, who may hold it, and
//! scheduling checks over a set of saved assignments.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::db::models::{
    Appointment, Assignment, AssignmentInput, AssignmentType, Gender, MeetingType, Member, Privilege,
};
use crate::{Error, Result};

/// Meeting(s) an assignment type can appear in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingScope {
    Midweek,
    Weekend,
    Either,
}

impl MeetingScope {
    pub fn allows(&self, meeting: MeetingType) -> bool {
        match self {
            MeetingScope::Either => true,
            MeetingScope::Midweek => meeting == MeetingType::Midweek,
            MeetingScope::Weekend => meeting == MeetingType::Weekend,
        }
    }
}

/// Appointment needed for an assignment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentRequirement {
    None,
    /// Elder or ministerial servant
    Appointed,
    Elder,
}

impl AppointmentRequirement {
    fn is_met_by(&self, appointment: Appointment) -> bool {
        match self {
            AppointmentRequirement::None => true,
            AppointmentRequirement::Appointed => appointment != Appointment::None,
            AppointmentRequirement::Elder => appointment == Appointment::Elder,
        }
    }
}

impl AssignmentType {
    pub fn scope(&self) -> MeetingScope {
        use AssignmentType::*;
        match self {
            Chairman | OpeningPrayer | ClosingPrayer | Attendant | Microphone | AudioVideo
            | Platform => MeetingScope::Either,
            Treasures | SpiritualGems | BibleReading | StartingConversation | FollowingUp
            | MakingDisciples | ExplainingBeliefs | StudentTalk | LivingPart
            | CongregationBibleStudy | CbsReader => MeetingScope::Midweek,
            PublicTalk | WatchtowerConductor | WatchtowerReader => MeetingScope::Weekend,
        }
    }

    pub fn required_privilege(&self) -> Privilege {
        use AssignmentType::*;
        match self {
            Chairman => Privilege::Chairman,
            OpeningPrayer | ClosingPrayer => Privilege::Prayer,
            Treasures => Privilege::Treasures,
            SpiritualGems => Privilege::SpiritualGems,
            BibleReading => Privilege::BibleReading,
            StartingConversation | FollowingUp | MakingDisciples | ExplainingBeliefs | StudentTalk => {
                Privilege::StudentParts
            }
            LivingPart => Privilege::LivingParts,
            CongregationBibleStudy => Privilege::CbsConductor,
            CbsReader | WatchtowerReader => Privilege::Reader,
            PublicTalk => Privilege::PublicSpeaker,
            WatchtowerConductor => Privilege::WatchtowerConductor,
            Attendant => Privilege::Attendant,
            Microphone => Privilege::Microphone,
            AudioVideo => Privilege::AudioVideo,
            Platform => Privilege::Platform,
        }
    }

    /// Demonstration parts open to sisters
    pub fn is_demonstration(&self) -> bool {
        matches!(
            self,
            AssignmentType::StartingConversation
                | AssignmentType::FollowingUp
                | AssignmentType::MakingDisciples
                | AssignmentType::ExplainingBeliefs
        )
    }

    pub fn requires_brother(&self) -> bool {
        !self.is_demonstration()
    }

    pub fn required_appointment(&self) -> AppointmentRequirement {
        use AssignmentType::*;
        match self {
            Chairman | Treasures | SpiritualGems | LivingPart | PublicTalk => {
                AppointmentRequirement::Appointed
            }
            CongregationBibleStudy | WatchtowerConductor => AppointmentRequirement::Elder,
            _ => AppointmentRequirement::None,
        }
    }
}

/// Reasons `member` may not hold `kind`; empty when eligible
pub fn eligibility_problems(member: &Member, kind: AssignmentType) -> Vec<String> {
    let mut problems = Vec::new();

    if !member.active {
        problems.push(format!("{} is not active", member.full_name()));
    }
    if kind.requires_brother() && member.gender != Gender::Male {
        problems.push(format!("{} is assigned to brothers only", kind));
    }
    let appointment = kind.required_appointment();
    if !appointment.is_met_by(member.appointment) {
        problems.push(match appointment {
            AppointmentRequirement::Elder => format!("{} requires an elder", kind),
            _ => format!("{} requires an elder or ministerial servant", kind),
        });
    }
    let privilege = kind.required_privilege();
    if !member.has_privilege(privilege) {
        problems.push(format!(
            "{} does not have the '{}' privilege",
            member.full_name(),
            privilege
        ));
    }

    problems
}

pub fn is_eligible(member: &Member, kind: AssignmentType) -> bool {
    eligibility_problems(member, kind).is_empty()
}

/// Validate an assignment before it is saved
///
/// Meeting/type mismatches and self-assistance are always rejected.
/// Eligibility problems are rejected unless `input.force` is set.
pub fn validate_assignment(
    input: &AssignmentInput,
    assignee: &Member,
    assistant: Option<&Member>,
) -> Result<()> {
    if !input.assignment_type.scope().allows(input.meeting_type) {
        return Err(Error::InvalidInput(format!(
            "{} is not part of the {} meeting",
            input.assignment_type, input.meeting_type
        )));
    }

    if let Some(assistant) = assistant {
        if assistant.id == assignee.id {
            return Err(Error::InvalidInput(
                "assignee and assistant must be different members".to_string(),
            ));
        }
    }

    if input.force {
        return Ok(());
    }

    let mut problems = eligibility_problems(assignee, input.assignment_type);
    if let Some(assistant) = assistant {
        if !assistant.active {
            problems.push(format!("{} is not active", assistant.full_name()));
        }
        if input.assignment_type.is_demonstration() && assistant.gender != assignee.gender {
            problems.push("assistant must be of the same gender as the student".to_string());
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidInput(problems.join("; ")))
    }
}

/// A member holding several parts in one meeting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentConflict {
    pub week_of: NaiveDate,
    pub meeting_type: MeetingType,
    pub member_id: Uuid,
    pub assignment_ids: Vec<Uuid>,
}

/// Members appearing more than once (as assignee or assistant) in the same
/// week and meeting, ordered by week, meeting, member
pub fn find_conflicts(assignments: &[Assignment]) -> Vec<AssignmentConflict> {
    let mut slots: BTreeMap<(NaiveDate, MeetingType, Uuid), Vec<Uuid>> = BTreeMap::new();

    for assignment in assignments {
        let people = std::iter::once(assignment.assignee_id).chain(assignment.assistant_id);
        for member_id in people {
            slots
                .entry((assignment.week_of, assignment.meeting_type, member_id))
                .or_default()
                .push(assignment.id);
        }
    }

    slots
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|((week_of, meeting_type, member_id), assignment_ids)| AssignmentConflict {
            week_of,
            meeting_type,
            member_id,
            assignment_ids,
        })
        .collect()
}

/// Pick an eligible member for `kind` in `week_of`
///
/// Members already holding a part that week are skipped. Among the rest,
/// whoever has gone longest without this assignment type wins (never
/// assigned first), then by last and first name.
pub fn suggest_assignee<'a>(
    candidates: &'a [Member],
    history: &[Assignment],
    kind: AssignmentType,
    week_of: NaiveDate,
) -> Option<&'a Member> {
    let busy: HashSet<Uuid> = history
        .iter()
        .filter(|a| a.week_of == week_of)
        .flat_map(|a| std::iter::once(a.assignee_id).chain(a.assistant_id))
        .collect();

    let last_held = |member_id: Uuid| -> Option<NaiveDate> {
        history
            .iter()
            .filter(|a| a.assignee_id == member_id && a.assignment_type == kind)
            .map(|a| a.week_of)
            .max()
    };

    candidates
        .iter()
        .filter(|m| !busy.contains(&m.id) && is_eligible(m, kind))
        .min_by_key(|m| (last_held(m.id), m.last_name.clone(), m.first_name.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::PioneerStatus;

    fn brother(first: &str, last: &str, appointment: Appointment, privileges: &[Privilege]) -> Member {
        Member {
            id: Uuid::new_v4(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            gender: Gender::Male,
            appointment,
            pioneer_status: PioneerStatus::None,
            privileges: privileges.to_vec(),
            group_id: None,
            email: None,
            phone: None,
            baptized: true,
            active: true,
        }
    }

    fn sister(first: &str, last: &str) -> Member {
        Member {
            gender: Gender::Female,
            ..brother(first, last, Appointment::None, &[Privilege::StudentParts])
        }
    }

    fn week(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn assignment(member: &Member, kind: AssignmentType, week_of: NaiveDate) -> Assignment {
        Assignment {
            id: Uuid::new_v4(),
            week_of,
            meeting_type: MeetingType::Midweek,
            assignment_type: kind,
            assignee_id: member.id,
            assistant_id: None,
            title: None,
            notes: None,
        }
    }

    fn input(kind: AssignmentType, meeting: MeetingType, assignee: &Member) -> AssignmentInput {
        AssignmentInput {
            week_of: week(3),
            meeting_type: meeting,
            assignment_type: kind,
            assignee_id: assignee.id,
            assistant_id: None,
            title: None,
            notes: None,
            force: false,
        }
    }

    #[test]
    fn test_every_type_has_a_scope_and_privilege() {
        for kind in AssignmentType::ALL {
            let scope = kind.scope();
            assert!(scope.allows(MeetingType::Midweek) || scope.allows(MeetingType::Weekend));
            let _ = kind.required_privilege();
        }
    }

    #[test]
    fn test_sister_can_take_demonstration_only() {
        let s = sister("Ana", "Lopez");
        assert!(is_eligible(&s, AssignmentType::StartingConversation));
        assert!(!is_eligible(&s, AssignmentType::BibleReading));
        assert!(!is_eligible(&s, AssignmentType::StudentTalk));
    }

    #[test]
    fn test_appointment_requirements() {
        let ms = brother(
            "Tom",
            "Reed",
            Appointment::MinisterialServant,
            &[Privilege::Treasures, Privilege::CbsConductor],
        );
        assert!(is_eligible(&ms, AssignmentType::Treasures));
        let problems = eligibility_problems(&ms, AssignmentType::CongregationBibleStudy);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("elder"));
    }

    #[test]
    fn test_missing_privilege_and_inactive() {
        let mut b = brother("Sam", "Hill", Appointment::None, &[]);
        b.active = false;
        let problems = eligibility_problems(&b, AssignmentType::OpeningPrayer);
        assert_eq!(problems.len(), 2);
    }

    #[test]
    fn test_validate_assignment_meeting_mismatch_not_forceable() {
        let elder = brother("Paul", "Gray", Appointment::Elder, &[Privilege::PublicSpeaker]);
        let mut req = input(AssignmentType::PublicTalk, MeetingType::Midweek, &elder);
        req.force = true;
        assert!(validate_assignment(&req, &elder, None).is_err());

        req.meeting_type = MeetingType::Weekend;
        assert!(validate_assignment(&req, &elder, None).is_ok());
    }

    #[test]
    fn test_validate_assignment_force_overrides_eligibility() {
        let b = brother("Sam", "Hill", Appointment::None, &[]);
        let mut req = input(AssignmentType::BibleReading, MeetingType::Midweek, &b);
        assert!(validate_assignment(&req, &b, None).is_err());
        req.force = true;
        assert!(validate_assignment(&req, &b, None).is_ok());
    }

    #[test]
    fn test_validate_assignment_assistant_rules() {
        let student = sister("Ana", "Lopez");
        let householder = sister("Eva", "Diaz");
        let wrong = brother("Sam", "Hill", Appointment::None, &[Privilege::StudentParts]);

        let mut req = input(AssignmentType::FollowingUp, MeetingType::Midweek, &student);
        req.assistant_id = Some(householder.id);
        assert!(validate_assignment(&req, &student, Some(&householder)).is_ok());
        assert!(validate_assignment(&req, &student, Some(&wrong)).is_err());
        assert!(validate_assignment(&req, &student, Some(&student)).is_err());
    }

    #[test]
    fn test_find_conflicts_counts_assistants() {
        let a = sister("Ana", "Lopez");
        let b = sister("Eva", "Diaz");
        let first = Assignment {
            assistant_id: Some(b.id),
            ..assignment(&a, AssignmentType::StartingConversation, week(3))
        };
        let second = assignment(&b, AssignmentType::FollowingUp, week(3));
        let other_week = assignment(&b, AssignmentType::FollowingUp, week(10));

        let conflicts = find_conflicts(&[first.clone(), second.clone(), other_week]);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].member_id, b.id);
        assert_eq!(conflicts[0].assignment_ids, vec![first.id, second.id]);
    }

    #[test]
    fn test_no_conflict_across_meetings() {
        let b = brother("Sam", "Hill", Appointment::None, &[Privilege::Prayer]);
        let midweek = assignment(&b, AssignmentType::OpeningPrayer, week(3));
        let weekend = Assignment {
            meeting_type: MeetingType::Weekend,
            ..assignment(&b, AssignmentType::OpeningPrayer, week(3))
        };
        assert!(find_conflicts(&[midweek, weekend]).is_empty());
    }

    #[test]
    fn test_suggest_prefers_longest_without_assignment() {
        let readers = [
            brother("Adam", "Cole", Appointment::None, &[Privilege::BibleReading]),
            brother("Ben", "Able", Appointment::None, &[Privilege::BibleReading]),
            brother("Carl", "Dunn", Appointment::None, &[]),
        ];
        let history = vec![
            assignment(&readers[0], AssignmentType::BibleReading, week(3)),
            assignment(&readers[1], AssignmentType::BibleReading, week(10)),
        ];

        let pick = suggest_assignee(&readers, &history, AssignmentType::BibleReading, week(17)).unwrap();
        assert_eq!(pick.id, readers[0].id);

        // Never-assigned beats everyone; ties fall back to last name
        let newcomer = brother("Dan", "Zed", Appointment::None, &[Privilege::BibleReading]);
        let mut all = readers.to_vec();
        all.push(newcomer.clone());
        let pick = suggest_assignee(&all, &history, AssignmentType::BibleReading, week(17)).unwrap();
        assert_eq!(pick.id, newcomer.id);
    }

    #[test]
    fn test_suggest_skips_members_busy_that_week() {
        let a = brother("Adam", "Cole", Appointment::None, &[Privilege::BibleReading, Privilege::Prayer]);
        let history = vec![assignment(&a, AssignmentType::OpeningPrayer, week(17))];
        assert!(suggest_assignee(&[a], &history, AssignmentType::BibleReading, week(17)).is_none());
    }
}
