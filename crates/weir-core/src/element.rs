//! BPMN element and connection kinds.
//!
//! Every flow element in a diagram carries exactly one [`ElementKind`];
//! geometry passes dispatch on it with exhaustive `match` instead of
//! comparing type strings. The kind also determines the typed default
//! size, the descriptive-id prefix, and the BPMN XML tag.

use serde::{Deserialize, Serialize};

use crate::geometry::Size;

/// The kind of a BPMN flow element or container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    StartEvent,
    EndEvent,
    IntermediateCatchEvent,
    IntermediateThrowEvent,
    BoundaryEvent,
    Task,
    UserTask,
    ServiceTask,
    ScriptTask,
    SendTask,
    ReceiveTask,
    ManualTask,
    BusinessRuleTask,
    SubProcess,
    CallActivity,
    ExclusiveGateway,
    ParallelGateway,
    InclusiveGateway,
    EventBasedGateway,
    DataObjectReference,
    DataStoreReference,
    TextAnnotation,
    Participant,
    Lane,
}

impl ElementKind {
    /// Parses a wire-level element type such as `bpmn:UserTask` or `userTask`.
    pub fn parse(value: &str) -> Option<Self> {
        let bare = value.strip_prefix("bpmn:").unwrap_or(value);
        let lowered = bare.to_ascii_lowercase();
        let kind = match lowered.as_str() {
            "startevent" => Self::StartEvent,
            "endevent" => Self::EndEvent,
            "intermediatecatchevent" => Self::IntermediateCatchEvent,
            "intermediatethrowevent" => Self::IntermediateThrowEvent,
            "boundaryevent" => Self::BoundaryEvent,
            "task" => Self::Task,
            "usertask" => Self::UserTask,
            "servicetask" => Self::ServiceTask,
            "scripttask" => Self::ScriptTask,
            "sendtask" => Self::SendTask,
            "receivetask" => Self::ReceiveTask,
            "manualtask" => Self::ManualTask,
            "businessruletask" => Self::BusinessRuleTask,
            "subprocess" => Self::SubProcess,
            "callactivity" => Self::CallActivity,
            "exclusivegateway" => Self::ExclusiveGateway,
            "parallelgateway" => Self::ParallelGateway,
            "inclusivegateway" => Self::InclusiveGateway,
            "eventbasedgateway" => Self::EventBasedGateway,
            "dataobjectreference" => Self::DataObjectReference,
            "datastorereference" => Self::DataStoreReference,
            "textannotation" => Self::TextAnnotation,
            "participant" => Self::Participant,
            "lane" => Self::Lane,
            _ => return None,
        };
        Some(kind)
    }

    /// The `bpmn:`-prefixed wire name of this kind.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::StartEvent => "bpmn:StartEvent",
            Self::EndEvent => "bpmn:EndEvent",
            Self::IntermediateCatchEvent => "bpmn:IntermediateCatchEvent",
            Self::IntermediateThrowEvent => "bpmn:IntermediateThrowEvent",
            Self::BoundaryEvent => "bpmn:BoundaryEvent",
            Self::Task => "bpmn:Task",
            Self::UserTask => "bpmn:UserTask",
            Self::ServiceTask => "bpmn:ServiceTask",
            Self::ScriptTask => "bpmn:ScriptTask",
            Self::SendTask => "bpmn:SendTask",
            Self::ReceiveTask => "bpmn:ReceiveTask",
            Self::ManualTask => "bpmn:ManualTask",
            Self::BusinessRuleTask => "bpmn:BusinessRuleTask",
            Self::SubProcess => "bpmn:SubProcess",
            Self::CallActivity => "bpmn:CallActivity",
            Self::ExclusiveGateway => "bpmn:ExclusiveGateway",
            Self::ParallelGateway => "bpmn:ParallelGateway",
            Self::InclusiveGateway => "bpmn:InclusiveGateway",
            Self::EventBasedGateway => "bpmn:EventBasedGateway",
            Self::DataObjectReference => "bpmn:DataObjectReference",
            Self::DataStoreReference => "bpmn:DataStoreReference",
            Self::TextAnnotation => "bpmn:TextAnnotation",
            Self::Participant => "bpmn:Participant",
            Self::Lane => "bpmn:Lane",
        }
    }

    /// The local XML tag name inside `bpmn:process`, e.g. `userTask`.
    pub fn xml_tag(self) -> &'static str {
        match self {
            Self::StartEvent => "startEvent",
            Self::EndEvent => "endEvent",
            Self::IntermediateCatchEvent => "intermediateCatchEvent",
            Self::IntermediateThrowEvent => "intermediateThrowEvent",
            Self::BoundaryEvent => "boundaryEvent",
            Self::Task => "task",
            Self::UserTask => "userTask",
            Self::ServiceTask => "serviceTask",
            Self::ScriptTask => "scriptTask",
            Self::SendTask => "sendTask",
            Self::ReceiveTask => "receiveTask",
            Self::ManualTask => "manualTask",
            Self::BusinessRuleTask => "businessRuleTask",
            Self::SubProcess => "subProcess",
            Self::CallActivity => "callActivity",
            Self::ExclusiveGateway => "exclusiveGateway",
            Self::ParallelGateway => "parallelGateway",
            Self::InclusiveGateway => "inclusiveGateway",
            Self::EventBasedGateway => "eventBasedGateway",
            Self::DataObjectReference => "dataObjectReference",
            Self::DataStoreReference => "dataStoreReference",
            Self::TextAnnotation => "textAnnotation",
            Self::Participant => "participant",
            Self::Lane => "lane",
        }
    }

    /// The prefix used when generating descriptive element ids.
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::StartEvent => "StartEvent",
            Self::EndEvent => "EndEvent",
            Self::IntermediateCatchEvent | Self::IntermediateThrowEvent | Self::BoundaryEvent => {
                "Event"
            }
            Self::UserTask => "UserTask",
            Self::ServiceTask => "ServiceTask",
            Self::ScriptTask => "ScriptTask",
            Self::Task
            | Self::SendTask
            | Self::ReceiveTask
            | Self::ManualTask
            | Self::BusinessRuleTask => "Task",
            Self::SubProcess => "SubProcess",
            Self::CallActivity => "CallActivity",
            Self::ExclusiveGateway
            | Self::ParallelGateway
            | Self::InclusiveGateway
            | Self::EventBasedGateway => "Gateway",
            Self::DataObjectReference => "DataObject",
            Self::DataStoreReference => "DataStore",
            Self::TextAnnotation => "Annotation",
            Self::Participant => "Participant",
            Self::Lane => "Lane",
        }
    }

    /// The typed default size for freshly created elements.
    ///
    /// The graph builder also uses these, deliberately ignoring whatever
    /// size the model currently records, so that layout is stable under
    /// prior manual resizing.
    pub fn default_size(self) -> Size {
        match self {
            Self::StartEvent
            | Self::EndEvent
            | Self::IntermediateCatchEvent
            | Self::IntermediateThrowEvent
            | Self::BoundaryEvent => Size::new(36.0, 36.0),
            Self::ExclusiveGateway
            | Self::ParallelGateway
            | Self::InclusiveGateway
            | Self::EventBasedGateway => Size::new(50.0, 50.0),
            Self::Task
            | Self::UserTask
            | Self::ServiceTask
            | Self::ScriptTask
            | Self::SendTask
            | Self::ReceiveTask
            | Self::ManualTask
            | Self::BusinessRuleTask
            | Self::CallActivity => Size::new(100.0, 80.0),
            Self::SubProcess => Size::new(350.0, 200.0),
            Self::DataObjectReference => Size::new(36.0, 50.0),
            Self::DataStoreReference => Size::new(50.0, 50.0),
            Self::TextAnnotation => Size::new(100.0, 30.0),
            Self::Participant => Size::new(600.0, 250.0),
            Self::Lane => Size::new(570.0, 120.0),
        }
    }

    /// Size of a collapsed subprocess (expanded uses [`default_size`](Self::default_size)).
    pub fn collapsed_size(self) -> Size {
        match self {
            Self::SubProcess => Size::new(100.0, 80.0),
            other => other.default_size(),
        }
    }

    pub fn is_event(self) -> bool {
        matches!(
            self,
            Self::StartEvent
                | Self::EndEvent
                | Self::IntermediateCatchEvent
                | Self::IntermediateThrowEvent
                | Self::BoundaryEvent
        )
    }

    pub fn is_gateway(self) -> bool {
        matches!(
            self,
            Self::ExclusiveGateway
                | Self::ParallelGateway
                | Self::InclusiveGateway
                | Self::EventBasedGateway
        )
    }

    /// Tasks, subprocesses, and call activities: the kinds a boundary
    /// event may attach to.
    pub fn is_activity(self) -> bool {
        matches!(
            self,
            Self::Task
                | Self::UserTask
                | Self::ServiceTask
                | Self::ScriptTask
                | Self::SendTask
                | Self::ReceiveTask
                | Self::ManualTask
                | Self::BusinessRuleTask
                | Self::SubProcess
                | Self::CallActivity
        )
    }

    /// Artifacts sit outside the sequence flow and are repositioned, not
    /// layered.
    pub fn is_artifact(self) -> bool {
        matches!(
            self,
            Self::DataObjectReference | Self::DataStoreReference | Self::TextAnnotation
        )
    }

    pub fn is_container(self) -> bool {
        matches!(self, Self::SubProcess | Self::Participant | Self::Lane)
    }

    /// Flow nodes participate in sequence-flow layering; artifacts,
    /// pools, and lanes do not.
    pub fn is_flow_node(self) -> bool {
        !self.is_artifact() && !matches!(self, Self::Participant | Self::Lane)
    }
}

/// The kind of a connection between two elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    SequenceFlow,
    MessageFlow,
    Association,
    DataInputAssociation,
    DataOutputAssociation,
}

impl EdgeKind {
    /// Parses a wire-level connection type such as `bpmn:SequenceFlow`.
    pub fn parse(value: &str) -> Option<Self> {
        let bare = value.strip_prefix("bpmn:").unwrap_or(value);
        match bare.to_ascii_lowercase().as_str() {
            "sequenceflow" => Some(Self::SequenceFlow),
            "messageflow" => Some(Self::MessageFlow),
            "association" => Some(Self::Association),
            "datainputassociation" => Some(Self::DataInputAssociation),
            "dataoutputassociation" => Some(Self::DataOutputAssociation),
            _ => None,
        }
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            Self::SequenceFlow => "bpmn:SequenceFlow",
            Self::MessageFlow => "bpmn:MessageFlow",
            Self::Association => "bpmn:Association",
            Self::DataInputAssociation => "bpmn:DataInputAssociation",
            Self::DataOutputAssociation => "bpmn:DataOutputAssociation",
        }
    }

    pub fn xml_tag(self) -> &'static str {
        match self {
            Self::SequenceFlow => "sequenceFlow",
            Self::MessageFlow => "messageFlow",
            Self::Association => "association",
            Self::DataInputAssociation => "dataInputAssociation",
            Self::DataOutputAssociation => "dataOutputAssociation",
        }
    }

    /// Sequence and message flows are routed orthogonally and take part
    /// in crossing counting; associations stay straight.
    pub fn is_flow(self) -> bool {
        matches!(self, Self::SequenceFlow | Self::MessageFlow)
    }
}

/// The event definition attached to an event element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventDefinitionKind {
    Message,
    Timer,
    Error,
    Signal,
    Escalation,
    Terminate,
    Conditional,
    Link,
    Compensate,
}

impl EventDefinitionKind {
    pub fn parse(value: &str) -> Option<Self> {
        let bare = value.strip_prefix("bpmn:").unwrap_or(value);
        let bare = bare.strip_suffix("EventDefinition").unwrap_or(bare);
        match bare.to_ascii_lowercase().as_str() {
            "message" => Some(Self::Message),
            "timer" => Some(Self::Timer),
            "error" => Some(Self::Error),
            "signal" => Some(Self::Signal),
            "escalation" => Some(Self::Escalation),
            "terminate" => Some(Self::Terminate),
            "conditional" => Some(Self::Conditional),
            "link" => Some(Self::Link),
            "compensate" => Some(Self::Compensate),
            _ => None,
        }
    }

    pub fn xml_tag(self) -> &'static str {
        match self {
            Self::Message => "messageEventDefinition",
            Self::Timer => "timerEventDefinition",
            Self::Error => "errorEventDefinition",
            Self::Signal => "signalEventDefinition",
            Self::Escalation => "escalationEventDefinition",
            Self::Terminate => "terminateEventDefinition",
            Self::Conditional => "conditionalEventDefinition",
            Self::Link => "linkEventDefinition",
            Self::Compensate => "compensateEventDefinition",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_prefixed_and_bare_names() {
        assert_eq!(
            ElementKind::parse("bpmn:UserTask"),
            Some(ElementKind::UserTask)
        );
        assert_eq!(ElementKind::parse("userTask"), Some(ElementKind::UserTask));
        assert_eq!(
            ElementKind::parse("exclusiveGateway"),
            Some(ElementKind::ExclusiveGateway)
        );
        assert_eq!(ElementKind::parse("bpmn:Nonsense"), None);
    }

    #[test]
    fn test_wire_and_xml_names_agree() {
        for kind in [
            ElementKind::StartEvent,
            ElementKind::BoundaryEvent,
            ElementKind::UserTask,
            ElementKind::SubProcess,
            ElementKind::ExclusiveGateway,
            ElementKind::DataObjectReference,
            ElementKind::Participant,
        ] {
            assert_eq!(ElementKind::parse(kind.wire_name()), Some(kind));
            assert_eq!(ElementKind::parse(kind.xml_tag()), Some(kind));
        }
    }

    #[test]
    fn test_typed_default_sizes() {
        assert_eq!(ElementKind::StartEvent.default_size(), Size::new(36.0, 36.0));
        assert_eq!(
            ElementKind::ParallelGateway.default_size(),
            Size::new(50.0, 50.0)
        );
        assert_eq!(ElementKind::UserTask.default_size(), Size::new(100.0, 80.0));
        assert_eq!(
            ElementKind::SubProcess.default_size(),
            Size::new(350.0, 200.0)
        );
        assert_eq!(
            ElementKind::SubProcess.collapsed_size(),
            Size::new(100.0, 80.0)
        );
    }

    #[test]
    fn test_predicates() {
        assert!(ElementKind::BoundaryEvent.is_event());
        assert!(ElementKind::EventBasedGateway.is_gateway());
        assert!(ElementKind::CallActivity.is_activity());
        assert!(!ElementKind::StartEvent.is_activity());
        assert!(ElementKind::TextAnnotation.is_artifact());
        assert!(!ElementKind::TextAnnotation.is_flow_node());
        assert!(!ElementKind::Lane.is_flow_node());
        assert!(ElementKind::SubProcess.is_flow_node());
    }

    #[test]
    fn test_edge_kind_parse() {
        assert_eq!(
            EdgeKind::parse("bpmn:MessageFlow"),
            Some(EdgeKind::MessageFlow)
        );
        assert_eq!(EdgeKind::parse("sequenceFlow"), Some(EdgeKind::SequenceFlow));
        assert!(EdgeKind::SequenceFlow.is_flow());
        assert!(!EdgeKind::Association.is_flow());
    }

    #[test]
    fn test_event_definition_parse() {
        assert_eq!(
            EventDefinitionKind::parse("bpmn:ErrorEventDefinition"),
            Some(EventDefinitionKind::Error)
        );
        assert_eq!(
            EventDefinitionKind::parse("timer"),
            Some(EventDefinitionKind::Timer)
        );
        assert_eq!(
            EventDefinitionKind::Terminate.xml_tag(),
            "terminateEventDefinition"
        );
    }
}
